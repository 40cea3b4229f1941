use serde::Serialize;

use crate::error::DispatchError;
use crate::http::{IntoHandlerResult, IntoPayload, Payload};

/// Standard JSON envelope `{"code": .., "msg": .., "data": ..}`.
///
/// # Example
/// ```
/// use switchyard::common::ApiResponse;
/// use switchyard::http::{IntoPayload, Payload};
/// use serde_json::json;
///
/// let payload = ApiResponse::success(json!({"id": 1})).into_payload().unwrap();
/// assert_eq!(payload, Payload::Json(json!({"code": 0, "msg": "ok", "data": {"id": 1}})));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i64,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// An envelope carrying only a code and a message.
    pub fn error(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoPayload for ApiResponse<T> {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        serde_json::to_value(&self)
            .map(Payload::Json)
            .map_err(DispatchError::from_handler)
    }
}

impl<T: Serialize> IntoHandlerResult for ApiResponse<T> {
    fn into_handler_result(self) -> Result<Payload, DispatchError> {
        self.into_payload()
    }
}

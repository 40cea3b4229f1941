use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// What a handler produced, before it is written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Html(String),
    Xml(String),
    Text(String),
    /// A download; written with `Content-Disposition: attachment`.
    Attachment {
        filename: String,
        bytes: Bytes,
        content_type: String,
    },
    Image {
        bytes: Bytes,
        mime: String,
    },
    /// An empty body with a bare status code.
    Status(u16),
}

impl Payload {
    /// A download of `bytes` typed `application/octet-stream`.
    pub fn attachment(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Payload::Attachment {
            filename: filename.into(),
            bytes: bytes.into(),
            content_type: OCTET_STREAM.to_string(),
        }
    }

    pub fn image(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Payload::Image {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Overrides the media type of an attachment; other payloads are returned as is.
    pub fn with_content_type(self, media_type: impl Into<String>) -> Self {
        match self {
            Payload::Attachment {
                filename, bytes, ..
            } => Payload::Attachment {
                filename,
                bytes,
                content_type: media_type.into(),
            },
            other => other,
        }
    }

    /// `None` for bodiless and unusable payloads.
    pub fn content_type(&self) -> Option<&str> {
        if self.is_unusable() {
            return None;
        }
        match self {
            Payload::Json(_) => Some("application/json; charset=utf-8"),
            Payload::Html(_) => Some("text/html; charset=utf-8"),
            Payload::Xml(_) => Some("application/xml; charset=utf-8"),
            Payload::Text(_) => Some("text/plain; charset=utf-8"),
            Payload::Attachment { content_type, .. } if content_type.is_empty() => {
                Some(OCTET_STREAM)
            }
            Payload::Attachment { content_type, .. } => Some(content_type.as_str()),
            Payload::Image { mime, .. } => Some(mime.as_str()),
            Payload::Status(_) => None,
        }
    }

    /// `Content-Disposition` value for attachments.
    pub fn content_disposition(&self) -> Option<String> {
        match self {
            Payload::Attachment { filename, .. } if !filename.is_empty() => {
                let filename: String = filename
                    .chars()
                    .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
                    .collect();
                Some(format!("attachment; filename=\"{filename}\""))
            }
            _ => None,
        }
    }

    /// An attachment without a file name or an image without a media type
    /// answers 400.
    pub fn status(&self) -> StatusCode {
        if self.is_unusable() {
            return StatusCode::BAD_REQUEST;
        }
        match self {
            Payload::Status(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::OK,
        }
    }

    pub fn into_body(self) -> Bytes {
        if self.is_unusable() {
            return Bytes::new();
        }
        match self {
            Payload::Json(value) => Bytes::from(value.to_string()),
            Payload::Html(s) | Payload::Xml(s) | Payload::Text(s) => Bytes::from(s),
            Payload::Attachment { bytes, .. } | Payload::Image { bytes, .. } => bytes,
            Payload::Status(_) => Bytes::new(),
        }
    }

    fn is_unusable(&self) -> bool {
        match self {
            Payload::Attachment { filename, .. } => filename.is_empty(),
            Payload::Image { mime, .. } => mime.is_empty(),
            _ => false,
        }
    }
}

/// Serializes its content as a JSON payload.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

#[derive(Debug, Clone)]
pub struct Html(pub String);

#[derive(Debug, Clone)]
pub struct Xml(pub String);

pub trait IntoPayload {
    fn into_payload(self) -> Result<Payload, DispatchError>;
}

impl IntoPayload for Payload {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(self)
    }
}

impl IntoPayload for Value {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Json(self))
    }
}

impl<T: Serialize> IntoPayload for Json<T> {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        serde_json::to_value(&self.0)
            .map(Payload::Json)
            .map_err(DispatchError::from_handler)
    }
}

impl IntoPayload for Html {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Html(self.0))
    }
}

impl IntoPayload for Xml {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Xml(self.0))
    }
}

impl IntoPayload for String {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Text(self))
    }
}

impl IntoPayload for &'static str {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Text(self.to_string()))
    }
}

impl IntoPayload for StatusCode {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Status(self.as_u16()))
    }
}

impl IntoPayload for () {
    fn into_payload(self) -> Result<Payload, DispatchError> {
        Ok(Payload::Status(StatusCode::OK.as_u16()))
    }
}

/// Conversion of a handler's return value into the dispatch outcome.
///
/// Implemented for every [`IntoPayload`] type and for `Result<T, E>` where
/// `E` is an error; errors keep the type name of `E` for exception-handler
/// lookup.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<Payload, DispatchError>;
}

macro_rules! handler_result_via_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoHandlerResult for $ty {
                fn into_handler_result(self) -> Result<Payload, DispatchError> {
                    self.into_payload()
                }
            }
        )*
    };
}

handler_result_via_payload!(Payload, Value, Html, Xml, String, &'static str, StatusCode, ());

impl<T: Serialize> IntoHandlerResult for Json<T> {
    fn into_handler_result(self) -> Result<Payload, DispatchError> {
        self.into_payload()
    }
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: IntoPayload,
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_handler_result(self) -> Result<Payload, DispatchError> {
        self.map_err(DispatchError::from_handler)?.into_payload()
    }
}

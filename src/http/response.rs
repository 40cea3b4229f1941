use axum::http::StatusCode;

use crate::http::Payload;

/// The response under construction for one dispatch.
///
/// Middleware add headers or adjust the status; the handler (or an exception
/// handler) supplies the payload.
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    payload: Option<Payload>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit status if one was set, else the payload's own status.
    pub fn status(&self) -> StatusCode {
        self.status
            .or_else(|| self.payload.as_ref().map(Payload::status))
            .unwrap_or(StatusCode::OK)
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Sets a header, replacing any earlier value with the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }
}

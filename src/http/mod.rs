//! Request, response and payload types the dispatcher works with.

pub mod payload;
pub mod request;
pub mod response;
pub mod token;
pub mod upload;

pub use payload::{Html, IntoHandlerResult, IntoPayload, Json, Payload, Xml};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use token::Token;
pub use upload::UploadedFile;

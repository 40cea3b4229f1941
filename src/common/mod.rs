//! Response shapes shared by handlers and exception handlers.

pub mod response;

pub use response::ApiResponse;

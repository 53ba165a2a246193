pub mod ingest;
pub mod stations;
pub mod status;
pub mod stream;

pub use ingest::*;
pub use stations::*;
pub use status::*;
pub use stream::*;

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Error payload shape shared by all handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

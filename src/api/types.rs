//! API response types

use serde::Serialize;

/// Body returned to the transport for an accepted update
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

//! Centralized error handling for the info API.
//!
//! Every method answers with the uniform envelope, so failures are carried
//! in the `status` / `errorMessage` fields of an HTTP 200 body rather than
//! through HTTP status codes. Callers switch on `status`, never on the
//! transport.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use custody_types::{CustodyError, Envelope};

/// API Result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Envelope status code reported for this error class.
    pub fn status(&self) -> i64 {
        match self {
            ApiError::Storage(_) => 1,
            ApiError::BadRequest(_) => 2,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Json(Envelope::<()>::failure(self.status(), self.to_string())).into_response()
    }
}

impl From<CustodyError> for ApiError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::InvalidDkgParameters(msg) => ApiError::BadRequest(msg),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

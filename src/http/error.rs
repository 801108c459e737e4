//! HTTP boundary error.

use axum::http::StatusCode;
use thiserror::Error;

use crate::probe::ProbeError;

/// Error returned by a wrapped handler: a status plus a client-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 500 carrying the source error's text.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<ProbeError> for HttpError {
    fn from(err: ProbeError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

//! Probe and dispatch errors.

use axum::http::StatusCode;
use thiserror::Error;

/// Nginx's "client closed request"; used when the caller went away mid-dispatch.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// No probe is registered under the requested name.
    #[error("No such probe [{0}]")]
    NotFound(String),

    /// A probe function reported a failure.
    #[error("{message}")]
    Failed {
        message: String,
        status: Option<StatusCode>,
    },

    /// The request was abandoned before the probe finished.
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// A failure that maps to 500.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            status: None,
        }
    }

    /// A failure carrying its own HTTP status.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProbeError::NotFound(_) => StatusCode::NOT_FOUND,
            ProbeError::Failed { status, .. } => status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ProbeError::Cancelled => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ProbeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//! Error types for the controller and its remote collaborator.

use std::fmt;

/// Detail payload the service attached to a rejected request.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionDetail {
    /// Body parsed as JSON (e.g. a validation report).
    Structured(serde_json::Value),
    /// Body that was not JSON, kept verbatim.
    Text(String),
}

impl RejectionDetail {
    /// Parse a response body: JSON when possible, raw text otherwise.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => Self::Structured(value),
            Err(_) => Self::Text(body.to_string()),
        }
    }
}

impl fmt::Display for RejectionDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => match serde_json::to_string_pretty(value) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{value}"),
            },
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Failure talking to the simulation service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("service responded {status}: {detail}")]
    Rejected {
        status: u16,
        detail: RejectionDetail,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Error surfaced at a session operation boundary.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Local precondition violated; the service was never contacted.
    #[error("{0}")]
    Validation(String),

    /// The service refused to start a session.
    #[error("Backend rejected request ({status}): {detail}")]
    RemoteRejected {
        status: u16,
        detail: RejectionDetail,
    },

    #[error("{operation} failed: {source}")]
    RemoteCallFailed {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

pub type ControlResult<T> = Result<T, ControlError>;

impl ControlError {
    pub fn remote_call_failed(operation: &'static str, source: BackendError) -> Self {
        ControlError::RemoteCallFailed { operation, source }
    }

    /// Short machine-friendly kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::RemoteCallFailed { .. } => "remote_call_failed",
        }
    }
}

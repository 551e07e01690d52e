//! Error taxonomy for target location
//!
//! Validation errors are raised at construction and never retried; a timeout
//! is a distinct terminal outcome of a wait; engine/capture/pointer errors are
//! collaborator failures and are never masked as "not found".

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no target found within {0:?}")]
    Timeout(Duration),

    #[error("recognition engine error: {0}")]
    Engine(String),

    #[error("screen capture error: {0}")]
    Capture(String),

    #[error("pointer error: {0}")]
    Pointer(String),
}

impl From<std::io::Error> for LocateError {
    fn from(err: std::io::Error) -> Self {
        LocateError::Engine(err.to_string())
    }
}

impl LocateError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LocateError::Timeout(_))
    }
}

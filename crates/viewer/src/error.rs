//! Error types for the viewing session

use thiserror::Error;

use crate::session::SessionState;

/// Failure reported by a rendering backend or a model parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend construction failed: {0}")]
    Construction(String),
    #[error("loader configuration rejected: {0}")]
    Config(String),
    #[error("model fetch failed: {0}")]
    Fetch(String),
    #[error("model parse failed: {0}")]
    Parse(String),
    #[error("parse worker unavailable")]
    WorkerGone,
    #[error("backend release failed: {0}")]
    Release(String),
}

/// Errors surfaced by session, loader and cleanup entry points.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Backend construction or configuration failed; the session is dead.
    #[error("initialization failed: {0}")]
    Initialization(#[source] BackendError),

    /// Fetch or parse failed; the session stays Ready.
    #[error("model load failed: {0}")]
    Load(#[source] BackendError),

    /// Backend release failed. Only ever logged by the cleanup path.
    #[error("disposal failed: {0}")]
    Disposal(#[source] BackendError),

    #[error("{operation} requires {expected}, session is {state:?}")]
    PreconditionViolation {
        operation: &'static str,
        expected: &'static str,
        state: SessionState,
    },

    /// The background parse worker thread could not be started.
    #[error("parse worker failed to start: {0}")]
    WorkerStart(#[source] std::io::Error),

    /// An in-flight task completed after the session was disposed.
    #[error("session was disposed before {0} completed")]
    SessionDisposed(&'static str),

    #[error("settings error: {0}")]
    Settings(String),
}

impl ViewerError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, ViewerError::PreconditionViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_worker_start_is_not_a_load_failure() {
        let err = ViewerError::WorkerStart(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "thread limit reached",
        ));
        assert!(!matches!(err, ViewerError::Load(_)));
        assert!(!err.is_precondition());
        assert!(err.to_string().starts_with("parse worker failed to start"));
        assert!(err.source().is_some());
    }
}

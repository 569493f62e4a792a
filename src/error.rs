use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::timer::TimerState;

/// Errors returned by timer and tracker operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("timer '{0}' already defined")]
    DuplicateTimerName(String),

    #[error("timer '{0}' not found")]
    TimerNotFound(String),

    #[error("timer '{name}' cannot be started while {state}")]
    InvalidTransition { name: String, state: TimerState },

    #[error("timer service is no longer running")]
    ServiceClosed,
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl<T> From<mpsc::error::SendError<T>> for TrackerError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        TrackerError::ServiceClosed
    }
}

impl From<oneshot::error::RecvError> for TrackerError {
    fn from(_: oneshot::error::RecvError) -> Self {
        TrackerError::ServiceClosed
    }
}

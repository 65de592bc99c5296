use thiserror::Error;

/// Reason a task run did not produce a value.
///
/// `Canceled` is the distinguished marker a task returns after it observed a cancellation request.
/// Every other variant is classified as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("canceled")]
    Canceled,
    #[error("task failed: {reason}")]
    Fail { reason: String },
    #[error("task panicked: {reason}")]
    Panicked { reason: String },
    #[error("worker lane: {reason}")]
    Lane { reason: String },
}

impl TaskError {
    /// Build a [`TaskError::Fail`] from anything printable.
    pub fn fail(reason: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Human-readable reason; `"canceled"` for the cancellation marker.
    pub fn reason(&self) -> &str {
        match self {
            TaskError::Canceled => "canceled",
            TaskError::Fail { reason }
            | TaskError::Panicked { reason }
            | TaskError::Lane { reason } => reason,
        }
    }
}

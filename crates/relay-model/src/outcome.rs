use crate::{RunStatus, TaskError};

/// Terminal result of exactly one task run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    /// `run` returned a value.
    Succeeded(T),
    /// The task observed a cancellation request and stopped.
    Canceled,
    /// Any other abort. Never carries [`TaskError::Canceled`].
    Failed(TaskError),
}

impl<T> TaskOutcome<T> {
    /// Classify the value returned by a task's `run`.
    pub fn from_result(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Succeeded(value),
            Err(TaskError::Canceled) => TaskOutcome::Canceled,
            Err(err) => TaskOutcome::Failed(err),
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            TaskOutcome::Succeeded(_) => RunStatus::Succeeded,
            TaskOutcome::Canceled => RunStatus::Canceled,
            TaskOutcome::Failed(_) => RunStatus::Failed,
        }
    }

    #[inline]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskOutcome::Canceled)
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    /// The produced value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            TaskOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// The failure detail, if any.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            TaskOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskOutcome<U> {
        match self {
            TaskOutcome::Succeeded(value) => TaskOutcome::Succeeded(f(value)),
            TaskOutcome::Canceled => TaskOutcome::Canceled,
            TaskOutcome::Failed(err) => TaskOutcome::Failed(err),
        }
    }
}

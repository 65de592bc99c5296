use serde::{Deserialize, Serialize};

/// Lifecycle state of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Launched; the worker lane has not started `run` yet.
    Pending,
    /// `run` is executing on the worker lane.
    Running,
    /// `run` returned a value.
    Succeeded,
    /// `run` aborted with a failure or panicked.
    Failed,
    /// `run` observed a cancellation request.
    Canceled,
}

impl RunStatus {
    /// Returns `true` if the run won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Canceled
        )
    }

    /// Returns `true` if the run is still in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

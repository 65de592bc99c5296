use serde::{Deserialize, Serialize};

use crate::{RunId, TaskName};

/// What happened to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    // launch
    RunLaunched,
    RunStarting,

    // control
    CancelRequested,

    // terminal
    RunSucceeded,
    RunCanceled,
    RunFailed,

    // delivery
    OutcomeDelivered,
    DeliveryDropped,
}

impl EventKind {
    /// Returns `true` for the three outcome kinds published once per run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::RunSucceeded | EventKind::RunCanceled | EventKind::RunFailed
        )
    }
}

/// Lifecycle event published by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run: RunId,
    pub task: TaskName,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RunEvent {
    pub fn new(run: RunId, task: impl Into<TaskName>, kind: EventKind) -> Self {
        Self {
            run,
            task: task.into(),
            kind,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

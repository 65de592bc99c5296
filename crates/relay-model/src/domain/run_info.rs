use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{RunId, RunStatus, TaskName};

/// Snapshot of a run as tracked by the run-state registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    /// Run identifier.
    pub id: RunId,
    /// Name reported by the task.
    pub task: TaskName,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Whether the caller asked the run to stop.
    pub cancel_requested: bool,
    /// When the run was launched.
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    /// When the run last changed.
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
    /// Failure detail (only for `Failed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunInfo {
    pub fn new(id: RunId, task: impl Into<TaskName>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            task: task.into(),
            status: RunStatus::Pending,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

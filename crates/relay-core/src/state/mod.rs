use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use relay_model::{EventKind, RunEvent, RunId, RunInfo, RunStatus};
use tracing::trace;

use crate::subscriber::Subscribe;

/// In-memory run state, kept current by subscribing to run events.
#[derive(Clone)]
pub struct RunState {
    inner: Arc<RwLock<HashMap<RunId, RunInfo>>>,
}

impl RunState {
    /// Create empty run state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a run (called on RunLaunched).
    pub fn add_run(&self, id: RunId, task: impl Into<String>) {
        self.write().insert(id, RunInfo::new(id, task));
    }

    /// Move a run to `status`, keeping the failure detail when given.
    pub fn update_status(&self, id: &RunId, status: RunStatus, error: Option<String>) {
        if let Some(info) = self.write().get_mut(id) {
            info.status = status;
            info.updated_at = SystemTime::now();
            if let Some(err) = error {
                info.error = Some(err);
            }
        }
    }

    /// Record that the caller asked the run to stop. Ignored for finished runs.
    pub fn mark_cancel_requested(&self, id: &RunId) {
        if let Some(info) = self.write().get_mut(id)
            && !info.status.is_terminal()
        {
            info.cancel_requested = true;
            info.updated_at = SystemTime::now();
        }
    }

    /// Remove a run from state.
    pub fn remove(&self, id: &RunId) -> Option<RunInfo> {
        self.write().remove(id)
    }

    /// Get run info by ID.
    pub fn get(&self, id: &RunId) -> Option<RunInfo> {
        self.read().get(id).cloned()
    }

    /// List all runs.
    pub fn list_all(&self) -> Vec<RunInfo> {
        self.read().values().cloned().collect()
    }

    /// List runs in `status`.
    pub fn list_by_status(&self, status: RunStatus) -> Vec<RunInfo> {
        self.read()
            .values()
            .filter(|info| info.status == status)
            .cloned()
            .collect()
    }

    /// Number of runs still pending or running.
    pub fn active_count(&self) -> usize {
        self.read()
            .values()
            .filter(|info| info.status.is_active())
            .count()
    }

    /// Drop the oldest terminal runs, keeping at most `keep` of them. Returns how many were removed.
    pub fn prune_terminal(&self, keep: usize) -> usize {
        let mut inner = self.write();

        let mut terminal: Vec<(RunId, SystemTime)> = inner
            .values()
            .filter(|info| info.status.is_terminal())
            .map(|info| (info.id, info.updated_at))
            .collect();
        if terminal.len() <= keep {
            return 0;
        }

        terminal.sort_by(|(_, a), (_, b)| a.cmp(b));
        let to_remove = terminal.len() - keep;
        for (id, _) in terminal.into_iter().take(to_remove) {
            inner.remove(&id);
        }
        trace!(removed = to_remove, "pruned terminal runs");
        to_remove
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RunId, RunInfo>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RunId, RunInfo>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscribe for RunState {
    fn on_event(&self, event: &RunEvent) {
        match event.kind {
            EventKind::RunLaunched => self.add_run(event.run, event.task.clone()),
            EventKind::RunStarting => self.update_status(&event.run, RunStatus::Running, None),
            EventKind::CancelRequested => self.mark_cancel_requested(&event.run),
            EventKind::RunSucceeded => self.update_status(&event.run, RunStatus::Succeeded, None),
            EventKind::RunCanceled => self.update_status(&event.run, RunStatus::Canceled, None),
            EventKind::RunFailed => {
                self.update_status(&event.run, RunStatus::Failed, event.reason.clone())
            }
            EventKind::OutcomeDelivered | EventKind::DeliveryDropped => {}
        }
    }

    fn name(&self) -> &'static str {
        "run-state"
    }
}

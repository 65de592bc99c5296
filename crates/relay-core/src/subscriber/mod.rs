use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use relay_model::RunEvent;
use tracing::error;

/// Observer of run lifecycle events.
///
/// Called synchronously on whichever lane produced the event (launching lane, worker lane or home context),
/// so implementations must be quick and must not block.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &RunEvent);

    fn name(&self) -> &'static str;
}

/// Fan-out of run events to the synchronizer's subscribers.
#[derive(Clone, Default)]
pub(crate) struct Bus {
    subscribers: Arc<[Arc<dyn Subscribe>]>,
}

impl Bus {
    pub(crate) fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            subscribers: subscribers.into(),
        }
    }

    pub(crate) fn extend(&self, more: Vec<Arc<dyn Subscribe>>) -> Self {
        let subscribers: Vec<Arc<dyn Subscribe>> =
            self.subscribers.iter().cloned().chain(more).collect();
        Self::new(subscribers)
    }

    pub(crate) fn publish(&self, event: RunEvent) {
        for sub in self.subscribers.iter() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(&event)));
            if delivered.is_err() {
                error!(
                    subscriber = sub.name(),
                    run = %event.run,
                    kind = ?event.kind,
                    "subscriber panicked while processing an event"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

use relay_core::Subscribe;
use relay_model::RunEvent;

use crate::subscriber::view::log_event;

/// Logs every run event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &RunEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}

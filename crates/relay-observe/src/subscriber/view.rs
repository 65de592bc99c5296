use relay_model::{EventKind, RunEvent};
use tracing::{debug, error, info, trace, warn};

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // launch
        EventKind::RunLaunched => "run launched (lane requested)",
        EventKind::RunStarting => "run starting on worker lane",

        // control
        EventKind::CancelRequested => "cancellation requested by caller",

        // terminal
        EventKind::RunSucceeded => "run succeeded",
        EventKind::RunCanceled => "run canceled (cancellation honored)",
        EventKind::RunFailed => "run failed",

        // delivery
        EventKind::OutcomeDelivered => "outcome delivered on home context",
        EventKind::DeliveryDropped => "outcome dropped (home context gone)",
    }
}

#[inline]
pub fn log_event(e: &RunEvent) {
    let msg = message_for(e.kind);
    let reason = e.reason.as_deref().unwrap_or("unknown");

    match e.kind {
        EventKind::RunLaunched => debug!(run = %e.run, task = %e.task, "{msg}"),
        EventKind::RunStarting => trace!(run = %e.run, task = %e.task, "{msg}"),
        EventKind::CancelRequested => info!(run = %e.run, task = %e.task, "{msg}"),

        EventKind::RunSucceeded => info!(run = %e.run, task = %e.task, "{msg}"),
        EventKind::RunCanceled => info!(run = %e.run, task = %e.task, "{msg}"),
        EventKind::RunFailed => error!(run = %e.run, task = %e.task, reason, "{msg}"),

        EventKind::OutcomeDelivered => trace!(run = %e.run, task = %e.task, "{msg}"),
        EventKind::DeliveryDropped => warn!(run = %e.run, task = %e.task, reason, "{msg}"),
    }
}

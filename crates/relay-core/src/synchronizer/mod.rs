//! The engine: runs a [`Task`] on its own lane and delivers exactly one outcome on a home context.
//!
//! Each `launch` is self-contained: a fresh cancellation controller, a fresh named thread and a single
//! [`Delivery`] that owns the completion callback. The callback can only leave a `Delivery` by being posted
//! to the home context, and a `Delivery` dropped without posting (spawn failure, unwinding lane) posts a
//! `Failed` outcome itself. Once posted, the outcome travels in a `Pending` job that reports
//! `DeliveryDropped` if the home context discards it unrun.
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use relay_model::{EventKind, RunEvent, RunId, TaskError, TaskOutcome};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    cancel::CancelController,
    error::CoreError,
    home::{HomeContext, Job},
    state::RunState,
    subscriber::{Bus, Subscribe},
    task::Task,
};

/// Lane settings applied to every run launched by a [`Synchronizer`].
#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    /// Prefix of worker thread names (`{prefix}-{task name}`).
    pub lane_prefix: String,
    /// Stack size for worker threads; `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            lane_prefix: "relay".to_string(),
            stack_size: None,
        }
    }
}

/// Launches tasks off the caller's lane and marshals their outcome back to a home context.
pub struct Synchronizer {
    home: Arc<dyn HomeContext>,
    cfg: SynchronizerConfig,
    bus: Bus,
}

impl Synchronizer {
    pub fn new<H: HomeContext>(home: H) -> Self {
        Self::from_arc(Arc::new(home))
    }

    pub fn from_arc(home: Arc<dyn HomeContext>) -> Self {
        Self {
            home,
            cfg: SynchronizerConfig::default(),
            bus: Bus::default(),
        }
    }

    pub fn with_config(mut self, cfg: SynchronizerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Add lifecycle event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.bus = self.bus.extend(subscribers);
        trace!(subscribers = self.bus.len(), "synchronizer subscribers updated");
        self
    }

    /// Track every run in `state`.
    pub fn with_state(self, state: RunState) -> Self {
        self.with_subscribers(vec![Arc::new(state)])
    }

    /// Home context captured by [`Synchronizer::launch`].
    pub fn home(&self) -> Arc<dyn HomeContext> {
        Arc::clone(&self.home)
    }

    pub fn config(&self) -> &SynchronizerConfig {
        &self.cfg
    }

    /// Run `task` on a new lane; `on_finished` runs exactly once, on this synchronizer's home context.
    ///
    /// Returns immediately.
    pub fn launch<T, F>(&self, task: T, on_finished: F) -> RunHandle
    where
        T: Task,
        F: FnOnce(TaskOutcome<T::Output>) + Send + 'static,
    {
        self.launch_on(Arc::clone(&self.home), task, on_finished)
    }

    /// Same as [`Synchronizer::launch`] with an explicit home context.
    #[instrument(level = "debug", skip_all, fields(task = %task.name()))]
    pub fn launch_on<T, F>(&self, home: Arc<dyn HomeContext>, mut task: T, on_finished: F) -> RunHandle
    where
        T: Task,
        F: FnOnce(TaskOutcome<T::Output>) + Send + 'static,
    {
        let run = RunId::new();
        let name = task.name().to_string();
        let controller = CancelController::new();
        let signal = controller.signal();
        let finished = Arc::new(AtomicBool::new(false));

        self.bus
            .publish(RunEvent::new(run, name.clone(), EventKind::RunLaunched));
        debug!(%run, "run launched");

        let slot = Arc::new(Mutex::new(Some(Delivery {
            run,
            task: name.clone(),
            home,
            bus: self.bus.clone(),
            finished: Arc::clone(&finished),
            callback: Some(Box::new(on_finished)),
        })));

        let lane_slot = Arc::clone(&slot);
        let bus = self.bus.clone();
        let lane_task = name.clone();
        let lane = move || {
            bus.publish(RunEvent::new(run, lane_task, EventKind::RunStarting));
            trace!(%run, "run starting");

            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task.run(&signal))) {
                Ok(result) => TaskOutcome::from_result(result),
                Err(payload) => TaskOutcome::Failed(TaskError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                }),
            };
            if let Some(progress) = task.progress_source() {
                progress.close();
            }
            if let Some(delivery) = take(&lane_slot) {
                delivery.deliver(outcome);
            }
        };

        let mut builder = thread::Builder::new().name(format!("{}-{}", self.cfg.lane_prefix, name));
        if let Some(size) = self.cfg.stack_size {
            builder = builder.stack_size(size);
        }
        if let Err(e) = builder.spawn(lane).map_err(CoreError::from) {
            error!(%run, error = %e, "failed to spawn worker lane");
            if let Some(delivery) = take(&slot) {
                delivery.deliver(TaskOutcome::Failed(TaskError::Lane {
                    reason: e.to_string(),
                }));
            }
        }

        RunHandle {
            run,
            task: name,
            controller,
            finished,
            bus: self.bus.clone(),
        }
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("cfg", &self.cfg)
            .field("subscribers", &self.bus.len())
            .finish()
    }
}

/// Caller-side control of one in-flight run.
///
/// Holding it means "a run is in flight"; callers usually keep it in an `Option` and clear it in the completion callback.
pub struct RunHandle {
    run: RunId,
    task: String,
    controller: CancelController,
    /// Set once the terminal outcome is known.
    finished: Arc<AtomicBool>,
    bus: Bus,
}

impl RunHandle {
    /// Ask the task to stop. Advisory, idempotent, and a no-op once the run has finished.
    pub fn request_cancel(&self) {
        if self.finished.load(Ordering::Acquire) {
            trace!(run = %self.run, task = %self.task, "run already finished; cancel ignored");
            return;
        }
        if self.controller.request_cancel() {
            debug!(run = %self.run, task = %self.task, "cancellation requested");
            self.bus.publish(RunEvent::new(
                self.run,
                self.task.clone(),
                EventKind::CancelRequested,
            ));
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run", &self.run)
            .field("task", &self.task)
            .field("cancel_requested", &self.controller.is_requested())
            .finish()
    }
}

type Callback<T> = Box<dyn FnOnce(TaskOutcome<T>) + Send + 'static>;

/// Single-use owner of a run's completion callback.
struct Delivery<T: Send + 'static> {
    run: RunId,
    task: String,
    home: Arc<dyn HomeContext>,
    bus: Bus,
    finished: Arc<AtomicBool>,
    callback: Option<Callback<T>>,
}

impl<T: Send + 'static> Delivery<T> {
    fn deliver(mut self, outcome: TaskOutcome<T>) {
        self.post(outcome);
    }

    fn post(&mut self, outcome: TaskOutcome<T>) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        self.finished.store(true, Ordering::Release);
        self.publish_terminal(&outcome);

        let pending = Pending {
            run: self.run,
            task: self.task.clone(),
            bus: self.bus.clone(),
            delivery: Some((callback, outcome)),
        };
        let job: Job = Box::new(move || pending.fire());

        // A refused job is dropped here, and its guard reports the loss.
        if let Err(e) = self.home.post(job) {
            debug!(run = %self.run, task = %self.task, error = %e, "home context refused the outcome");
        }
    }

    fn publish_terminal(&self, outcome: &TaskOutcome<T>) {
        let event = match outcome {
            TaskOutcome::Succeeded(_) => {
                info!(run = %self.run, task = %self.task, "run succeeded");
                RunEvent::new(self.run, self.task.clone(), EventKind::RunSucceeded)
            }
            TaskOutcome::Canceled => {
                info!(run = %self.run, task = %self.task, "run canceled");
                RunEvent::new(self.run, self.task.clone(), EventKind::RunCanceled)
            }
            TaskOutcome::Failed(err) => {
                error!(run = %self.run, task = %self.task, reason = %err, "run failed");
                RunEvent::new(self.run, self.task.clone(), EventKind::RunFailed)
                    .with_reason(err.to_string())
            }
        };
        self.bus.publish(event);
    }
}

impl<T: Send + 'static> Drop for Delivery<T> {
    fn drop(&mut self) {
        if self.callback.is_some() {
            self.post(TaskOutcome::Failed(TaskError::Lane {
                reason: "worker lane ended before delivering an outcome".to_string(),
            }));
        }
    }
}

/// The outcome job sitting in a home context's queue.
///
/// Dropped without running (refused post, home loop dropped with the job still queued) it publishes
/// `DeliveryDropped` instead.
struct Pending<T: Send + 'static> {
    run: RunId,
    task: String,
    bus: Bus,
    delivery: Option<(Callback<T>, TaskOutcome<T>)>,
}

impl<T: Send + 'static> Pending<T> {
    fn fire(mut self) {
        if let Some((callback, outcome)) = self.delivery.take() {
            callback(outcome);
            self.bus.publish(RunEvent::new(
                self.run,
                self.task.clone(),
                EventKind::OutcomeDelivered,
            ));
        }
    }
}

impl<T: Send + 'static> Drop for Pending<T> {
    fn drop(&mut self) {
        if self.delivery.take().is_some() {
            warn!(run = %self.run, task = %self.task, "outcome dropped; home context is gone");
            self.bus.publish(
                RunEvent::new(self.run, self.task.clone(), EventKind::DeliveryDropped)
                    .with_reason(CoreError::HomeClosed.to_string()),
            );
        }
    }
}

fn take<T: Send + 'static>(slot: &Mutex<Option<Delivery<T>>>) -> Option<Delivery<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;

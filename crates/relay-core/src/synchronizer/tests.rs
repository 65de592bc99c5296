use std::{
    marker::PhantomData,
    sync::{Mutex, mpsc},
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use relay_model::{RunStatus, TaskError, TaskOutcome};

use super::*;
use crate::{
    cancel::CancelSignal,
    home::HomeLoop,
    progress::{ProgressSource, ProgressSubject},
};

const WAIT: Duration = Duration::from_secs(5);

struct Probe<F, T> {
    name: &'static str,
    f: F,
    _out: PhantomData<fn() -> T>,
}

fn probe<F, T>(name: &'static str, f: F) -> Probe<F, T>
where
    F: FnMut(&CancelSignal) -> Result<T, TaskError> + Send + 'static,
{
    Probe {
        name,
        f,
        _out: PhantomData,
    }
}

impl<F, T> Task for Probe<F, T>
where
    F: FnMut(&CancelSignal) -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        self.name
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<T, TaskError> {
        (self.f)(signal)
    }
}

type Seen<T> = Arc<Mutex<Vec<(TaskOutcome<T>, ThreadId)>>>;

fn recorder<T: Send + 'static>() -> (Seen<T>, impl FnOnce(TaskOutcome<T>) + Send + 'static) {
    let seen: Seen<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |outcome: TaskOutcome<T>| {
        sink.lock().unwrap().push((outcome, thread::current().id()))
    })
}

async fn drive_until<F: FnMut() -> bool>(home: &mut HomeLoop, done: F) {
    tokio::time::timeout(WAIT, home.run_until(done))
        .await
        .expect("home loop timed out waiting for delivery");
}

struct Events(Mutex<Vec<RunEvent>>);

impl Events {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl Subscribe for Events {
    fn on_event(&self, event: &RunEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
    fn name(&self) -> &'static str {
        "events"
    }
}

#[tokio::test]
async fn success_is_delivered_once_on_home_lane() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder();

    let handle = sync.launch(probe("answer", |_| Ok(42)), on_finished);
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    handle.request_cancel();
    handle.request_cancel();
    home.run_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, TaskOutcome::Succeeded(42));
    assert_eq!(seen[0].1, thread::current().id());
}

#[tokio::test]
async fn cancellation_yields_canceled_never_success() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder();

    let task = probe("spin", |signal: &CancelSignal| {
        for _ in 0..1_000 {
            signal.sleep(Duration::from_millis(10))?;
        }
        Ok("finished")
    });
    let handle = sync.launch(task, on_finished);
    handle.request_cancel();
    handle.request_cancel();

    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;
    assert_eq!(seen.lock().unwrap()[0].0, TaskOutcome::Canceled);
}

#[tokio::test]
async fn failure_detail_is_forwarded() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder::<u8>();

    sync.launch(
        probe("sensor", |_| Err(TaskError::fail("sensor offline"))),
        on_finished,
    );
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    assert_eq!(
        seen.lock().unwrap()[0].0,
        TaskOutcome::Failed(TaskError::fail("sensor offline"))
    );
}

#[tokio::test]
async fn panic_is_classified_as_failure() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder::<u8>();

    sync.launch(probe("kaboom", |_| panic!("kaboom")), on_finished);
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].0,
        TaskOutcome::Failed(TaskError::Panicked {
            reason: "kaboom".into()
        })
    );
}

#[tokio::test]
async fn launch_returns_before_run_completes() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder();
    let (release, gate) = mpsc::channel::<u32>();

    let task = probe("gated", move |_| gate.recv().map_err(TaskError::fail));
    let _handle = sync.launch(task, on_finished);

    assert_eq!(home.run_pending(), 0);
    assert!(seen.lock().unwrap().is_empty());

    release.send(7).unwrap();
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;
    assert_eq!(seen.lock().unwrap()[0].0, TaskOutcome::Succeeded(7));
}

struct Counting {
    progress: ProgressSubject<u32>,
}

impl Task for Counting {
    type Output = &'static str;

    fn name(&self) -> &str {
        "counting"
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<&'static str, TaskError> {
        for p in 0..5 {
            signal.check()?;
            self.progress.emit(p);
        }
        Ok("done")
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        Some(&self.progress)
    }
}

#[tokio::test]
async fn progress_precedes_terminal_delivery_and_is_closed_after() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let task = Counting {
        progress: ProgressSubject::new(),
    };
    let subject = task.progress.clone();
    let progress_log = Arc::clone(&log);
    subject
        .observe_on(home.handle(), move |p: &u32| {
            progress_log.lock().unwrap().push(format!("p{p}"))
        })
        .detach();

    let done_log = Arc::clone(&log);
    sync.launch(task, move |outcome| {
        done_log.lock().unwrap().push(format!("{:?}", outcome.ok()))
    });

    drive_until(&mut home, || log.lock().unwrap().len() == 6).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["p0", "p1", "p2", "p3", "p4", "Some(\"done\")"]
    );
    assert!(subject.is_closed());
    assert_eq!(subject.emit(99), 0);
}

#[tokio::test]
async fn sequential_launches_are_independent() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (first, on_first) = recorder();
    let (second, on_second) = recorder();

    sync.launch(probe("first", |_| Ok(1)), on_first);
    drive_until(&mut home, || !first.lock().unwrap().is_empty()).await;

    sync.launch(probe("second", |_| Ok(2)), on_second);
    drive_until(&mut home, || !second.lock().unwrap().is_empty()).await;
    home.run_pending();

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(first.lock().unwrap()[0].0, TaskOutcome::Succeeded(1));
    assert_eq!(second.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap()[0].0, TaskOutcome::Succeeded(2));
}

#[tokio::test]
async fn lane_is_named_after_prefix_and_task() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle()).with_config(SynchronizerConfig {
        lane_prefix: "vent".to_string(),
        stack_size: Some(256 * 1024),
    });
    let (seen, on_finished) = recorder();

    sync.launch(
        probe("backup", |_| Ok(thread::current().name().map(str::to_string))),
        on_finished,
    );
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, TaskOutcome::Succeeded(Some("vent-backup".to_string())));
}

#[tokio::test]
async fn events_and_state_follow_the_run() {
    let mut home = HomeLoop::new();
    let events = Events::new();
    let state = RunState::new();
    let sync = Synchronizer::new(home.handle())
        .with_subscribers(vec![events.clone() as Arc<dyn Subscribe>])
        .with_state(state.clone());
    let (seen, on_finished) = recorder::<u8>();

    let task = probe("watched", |signal: &CancelSignal| loop {
        signal.sleep(Duration::from_millis(5))?;
    });
    let handle = sync.launch(task, on_finished);
    handle.request_cancel();
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    let kinds = events.kinds();
    assert_eq!(kinds.first(), Some(&EventKind::RunLaunched));
    assert!(kinds.contains(&EventKind::RunStarting));
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::CancelRequested).count(),
        1
    );
    assert_eq!(kinds.iter().filter(|k| k.is_terminal()).count(), 1);
    assert!(kinds.contains(&EventKind::RunCanceled));
    assert_eq!(kinds.last(), Some(&EventKind::OutcomeDelivered));

    let runs = state.list_all();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].task, "watched");
    assert_eq!(runs[0].status, RunStatus::Canceled);
    assert!(runs[0].cancel_requested);
}

#[test]
fn dropped_home_reports_delivery_dropped() {
    let home = HomeLoop::new();
    let events = Events::new();
    let sync = Synchronizer::new(home.handle()).with_subscribers(vec![events.clone() as Arc<dyn Subscribe>]);
    drop(home);

    let (seen, on_finished) = recorder();
    sync.launch(probe("orphan", |_| Ok(())), on_finished);

    let started = Instant::now();
    while !events.kinds().contains(&EventKind::DeliveryDropped) {
        assert!(started.elapsed() < WAIT, "DeliveryDropped was never published");
        thread::sleep(Duration::from_millis(5));
    }
    assert!(seen.lock().unwrap().is_empty());
    assert!(!events.kinds().contains(&EventKind::OutcomeDelivered));
}

#[tokio::test]
async fn cancel_after_delivery_is_a_no_op() {
    let mut home = HomeLoop::new();
    let events = Events::new();
    let state = RunState::new();
    let sync = Synchronizer::new(home.handle())
        .with_subscribers(vec![events.clone() as Arc<dyn Subscribe>])
        .with_state(state.clone());
    let (seen, on_finished) = recorder();

    let handle = sync.launch(probe("quick", |_| Ok(5)), on_finished);
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;

    handle.request_cancel();
    handle.request_cancel();
    home.run_pending();

    assert!(!events.kinds().contains(&EventKind::CancelRequested));
    let runs = state.list_all();
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert!(!runs[0].cancel_requested);
    assert!(format!("{handle:?}").contains("cancel_requested: false"));
}

#[test]
fn home_dropped_with_queued_outcome_reports_delivery_dropped() {
    let home = HomeLoop::new();
    let events = Events::new();
    let sync = Synchronizer::new(home.handle())
        .with_subscribers(vec![events.clone() as Arc<dyn Subscribe>]);
    let (seen, on_finished) = recorder();

    sync.launch(probe("queued", |_| Ok(())), on_finished);

    let started = Instant::now();
    while !events.kinds().contains(&EventKind::RunSucceeded) {
        assert!(started.elapsed() < WAIT, "run never finished");
        thread::sleep(Duration::from_millis(5));
    }
    drop(home);

    let kinds = events.kinds();
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::DeliveryDropped).count(),
        1
    );
    assert!(!kinds.contains(&EventKind::OutcomeDelivered));
}

struct BrokenSource;

impl Task for BrokenSource {
    type Output = u8;

    fn name(&self) -> &str {
        "broken-source"
    }

    fn run(&mut self, _signal: &CancelSignal) -> Result<u8, TaskError> {
        Ok(1)
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        panic!("progress source unavailable")
    }
}

#[tokio::test]
async fn lane_unwinding_after_run_delivers_lane_failure() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let (seen, on_finished) = recorder();

    sync.launch(BrokenSource, on_finished);
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;
    home.run_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].0,
        TaskOutcome::Failed(TaskError::Lane {
            reason: "worker lane ended before delivering an outcome".into()
        })
    );
}

#[cfg(all(target_os = "linux", target_env = "gnu", target_pointer_width = "64"))]
#[tokio::test]
async fn spawn_failure_delivers_lane_failure() {
    let mut home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle()).with_config(SynchronizerConfig {
        lane_prefix: "relay".to_string(),
        // Larger than the user address space, so the lane cannot be created.
        stack_size: Some(1 << 60),
    });
    let (seen, on_finished) = recorder::<u8>();

    sync.launch(probe("never", |_| Ok(1)), on_finished);
    drive_until(&mut home, || !seen.lock().unwrap().is_empty()).await;
    home.run_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(matches!(
        &seen[0].0,
        TaskOutcome::Failed(TaskError::Lane { reason }) if reason.contains("spawn")
    ));
}

#[test]
fn debug_output_hides_callbacks() {
    let home = HomeLoop::new();
    let sync = Synchronizer::new(home.handle());
    let handle = sync.launch(probe("dbg", |_| Ok(())), |_| {});

    let rendered = format!("{handle:?}");
    assert!(rendered.contains("RunHandle"));
    assert!(rendered.contains("dbg"));
    assert!(format!("{sync:?}").contains("relay"));
}

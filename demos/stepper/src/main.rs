use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};

use relay_core::{HomeLoop, RunHandle, RunState, Subscribe, Synchronizer};
use relay_exec::{StepConfig, StepTask};
use relay_model::{StepProgress, TaskOutcome};
use relay_observe::{Journal, LoggerConfig, logger_init};

/// Run the stepping workload once and cancel it on request.
#[derive(Debug, Parser)]
#[command(name = "stepper", version)]
struct Args {
    /// Number of steps (one progress notification per step)
    #[arg(long, default_value_t = StepConfig::default().steps)]
    steps: u32,

    /// Duration of one step in milliseconds
    #[arg(long, default_value_t = StepConfig::default().interval.as_millis() as u64)]
    interval_ms: u64,

    /// Request cancellation after this many progress notifications
    #[arg(long)]
    cancel_after: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1) Logger
    logger_init(&LoggerConfig::default())?;

    // 2) Home context + synchronizer
    let mut home = HomeLoop::new();
    let state = RunState::new();
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Journal::new())];
    let sync = Synchronizer::new(home.handle())
        .with_subscribers(subscribers)
        .with_state(state.clone());
    info!(?sync, "synchronizer ready");

    // 3) Workload
    let task = StepTask::new(StepConfig {
        name: "stepper".to_string(),
        steps: args.steps,
        interval: Duration::from_millis(args.interval_ms),
        value: None,
    });

    // Only one run at a time; cleared on the home context when the outcome lands.
    let current: Arc<Mutex<Option<RunHandle>>> = Arc::new(Mutex::new(None));
    let finished = Arc::new(Mutex::new(None::<TaskOutcome<f64>>));

    let seen = Arc::new(Mutex::new(0usize));
    let progress_handle = Arc::clone(&current);
    let cancel_after = args.cancel_after;
    task.progress()
        .observe_on(home.handle(), move |p: &StepProgress| {
            info!(step = p.step, total = p.total, "progress {:.0}%", p.percent);
            let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
            *seen += 1;
            if Some(*seen) == cancel_after {
                let current = progress_handle.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(handle) = current.as_ref() {
                    info!(after = *seen, "requesting cancellation");
                    handle.request_cancel();
                }
            }
        })
        .detach();

    // 4) Launch
    let done_handle = Arc::clone(&current);
    let done = Arc::clone(&finished);
    let handle = sync.launch(task, move |outcome| {
        done_handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        *done.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
    });
    *current.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    info!("press Ctrl+C to cancel");

    // 5) Drive the home context until the outcome arrives
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    while finished.lock().unwrap_or_else(|e| e.into_inner()).is_none() {
        tokio::select! {
            alive = home.turn() => {
                if !alive {
                    break;
                }
            }
            res = &mut ctrl_c, if !interrupted => {
                res?;
                interrupted = true;
                match current.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
                    Some(handle) => handle.request_cancel(),
                    None => warn!("nothing to cancel"),
                }
            }
        }
    }

    let outcome = finished.lock().unwrap_or_else(|e| e.into_inner()).take();
    match outcome {
        Some(TaskOutcome::Succeeded(value)) => info!(value, "finished"),
        Some(TaskOutcome::Canceled) => info!("canceled"),
        Some(TaskOutcome::Failed(err)) => bail!(err),
        None => bail!("home context closed before an outcome arrived"),
    }
    for run in state.list_all() {
        info!(run = %run.id, task = %run.task, status = ?run.status, "run summary");
    }
    Ok(())
}

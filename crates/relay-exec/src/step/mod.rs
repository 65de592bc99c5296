//! Reference workload: a fixed number of timed steps with progress after each one.
use std::time::Duration;

use relay_core::{CancelSignal, ProgressSource, ProgressSubject, Task};
use relay_model::{StepProgress, TaskError};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct StepConfig {
    pub name: String,
    /// Number of steps; progress is emitted once per step.
    pub steps: u32,
    /// Duration of one step. Cancellation is noticed within one interval.
    pub interval: Duration,
    /// Value returned on success; a random `f64` in `[0, 1)` when `None`.
    pub value: Option<f64>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: "step".to_string(),
            steps: 10,
            interval: Duration::from_millis(100),
            value: None,
        }
    }
}

pub struct StepTask {
    cfg: StepConfig,
    progress: ProgressSubject<StepProgress>,
}

impl StepTask {
    pub fn new(cfg: StepConfig) -> Self {
        Self {
            cfg,
            progress: ProgressSubject::new(),
        }
    }

    pub fn progress(&self) -> &ProgressSubject<StepProgress> {
        &self.progress
    }

    pub fn config(&self) -> &StepConfig {
        &self.cfg
    }
}

impl Default for StepTask {
    fn default() -> Self {
        Self::new(StepConfig::default())
    }
}

impl Task for StepTask {
    type Output = f64;

    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<f64, TaskError> {
        let total = self.cfg.steps;
        for step in 0..total {
            signal.sleep(self.cfg.interval)?;
            signal.check()?;

            let progress = StepProgress::new(step, total);
            trace!(step, percent = progress.percent, "step finished");
            self.progress.emit(progress);
        }
        Ok(self.cfg.value.unwrap_or_else(rand::random))
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        Some(&self.progress)
    }
}

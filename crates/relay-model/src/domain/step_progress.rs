use serde::{Deserialize, Serialize};

/// Progress payload emitted by step-based workloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    /// Zero-based index of the step that just finished.
    pub step: u32,
    /// Total number of steps in the run.
    pub total: u32,
    /// Percent complete at the time of emission, `step * 100 / total`.
    pub percent: f64,
}

impl StepProgress {
    pub fn new(step: u32, total: u32) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            f64::from(step) * 100.0 / f64::from(total)
        };
        Self {
            step,
            total,
            percent,
        }
    }
}

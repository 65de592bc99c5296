//! # Task abstraction for synchronized execution.
//!
//! A [`Task`] is a synchronous, cancelable unit of work. The [`Synchronizer`](crate::Synchronizer) gives it a dedicated lane,
//! so implementations never manage threads themselves.
//!
//! ## Rules
//! - One task value maps to exactly one run: `launch` takes it by value.
//! - Implementations **must** poll the [`CancelSignal`] at bounded intervals and return [`TaskError::Canceled`] once it is requested.
//! - Tasks that emit progress own a [`ProgressSubject`](crate::ProgressSubject) and expose it via [`Task::progress_source`]
//!   so the run can close it when `run` returns.
use relay_model::TaskError;

use crate::{cancel::CancelSignal, progress::ProgressSource};

/// Synchronous, cancelable unit of work producing a typed value.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use relay_core::{CancelSignal, Task};
/// use relay_model::TaskError;
///
/// struct Countdown(u32);
///
/// impl Task for Countdown {
///     type Output = u32;
///
///     fn name(&self) -> &str {
///         "countdown"
///     }
///
///     fn run(&mut self, signal: &CancelSignal) -> Result<u32, TaskError> {
///         while self.0 > 0 {
///             signal.sleep(Duration::from_millis(10))?;
///             self.0 -= 1;
///         }
///         Ok(self.0)
///     }
/// }
/// ```
pub trait Task: Send + 'static {
    type Output: Send + 'static;

    /// Stable, human-readable name used for lane names, logs and events.
    fn name(&self) -> &str {
        "task"
    }

    /// Run to completion on the calling lane.
    fn run(&mut self, signal: &CancelSignal) -> Result<Self::Output, TaskError>;

    /// Progress stream to close once `run` returns, if the task has one.
    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        None
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    type Output = T::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<Self::Output, TaskError> {
        (**self).run(signal)
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        (**self).progress_source()
    }
}

use std::marker::PhantomData;

use relay_core::{CancelSignal, ProgressSource, ProgressSubject, Task};
use relay_model::TaskError;

/// Task backed by a closure.
///
/// The closure receives the run's [`CancelSignal`] and is responsible for polling it.
pub struct FnTask<F, T> {
    name: String,
    f: F,
    _out: PhantomData<fn() -> T>,
}

impl<F, T> FnTask<F, T>
where
    F: FnMut(&CancelSignal) -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _out: PhantomData,
        }
    }
}

impl<F, T> Task for FnTask<F, T>
where
    F: FnMut(&CancelSignal) -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<T, TaskError> {
        (self.f)(signal)
    }
}

/// Closure-backed task that also reports progress.
///
/// Subscribe through [`ReportingFnTask::progress`] before launching; the stream is closed when the run ends.
pub struct ReportingFnTask<F, T, P> {
    name: String,
    f: F,
    progress: ProgressSubject<P>,
    _out: PhantomData<fn() -> T>,
}

impl<F, T, P> ReportingFnTask<F, T, P>
where
    F: FnMut(&CancelSignal, &ProgressSubject<P>) -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
    P: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            progress: ProgressSubject::new(),
            _out: PhantomData,
        }
    }

    pub fn progress(&self) -> &ProgressSubject<P> {
        &self.progress
    }
}

impl<F, T, P> Task for ReportingFnTask<F, T, P>
where
    F: FnMut(&CancelSignal, &ProgressSubject<P>) -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
    P: Clone + Send + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<T, TaskError> {
        (self.f)(signal, &self.progress)
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        Some(&self.progress)
    }
}

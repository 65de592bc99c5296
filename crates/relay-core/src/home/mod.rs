//! Home contexts: where terminal outcomes (and, optionally, progress) get delivered.
//!
//! A home context only needs to accept a boxed callback and run it later on its own lane.
//! [`HomeLoop`] is the provided implementation: a FIFO queue drained by whoever owns the loop.
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::error::CoreError;

/// Zero-argument callback posted to a home context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// "Run this callback later, on me."
///
/// Implementations must run jobs in the order they were posted.
pub trait HomeContext: Send + Sync + 'static {
    fn post(&self, job: Job) -> Result<(), CoreError>;
}

impl<H: HomeContext + ?Sized> HomeContext for Arc<H> {
    fn post(&self, job: Job) -> Result<(), CoreError> {
        (**self).post(job)
    }
}

/// Cloneable posting side of a [`HomeLoop`].
#[derive(Clone, Debug)]
pub struct HomeHandle {
    tx: UnboundedSender<Job>,
}

impl HomeHandle {
    /// Returns `true` once the loop was closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl HomeContext for HomeHandle {
    fn post(&self, job: Job) -> Result<(), CoreError> {
        self.tx.send(job).map_err(|_| CoreError::HomeClosed)
    }
}

/// Single-consumer event loop acting as a home context.
///
/// Whoever drives the loop (`turn`, `run_pending`, `run_until`, `blocking_turn`) *is* the home lane.
/// The loop keeps its own sender, so it stays open until [`HomeLoop::close`] or drop.
pub struct HomeLoop {
    tx: UnboundedSender<Job>,
    rx: UnboundedReceiver<Job>,
}

impl HomeLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> HomeHandle {
        HomeHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every job queued right now without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Wait for the next job and run it. Returns `false` once the loop is closed and drained.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until `done` holds (checked before each wait) or the loop is drained after close.
    pub async fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut() -> bool,
    {
        while !done() {
            if !self.turn().await {
                break;
            }
        }
    }

    /// Blocking variant of [`HomeLoop::turn`] for plain threads.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_turn(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Refuse new posts; already queued jobs can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Default for HomeLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn runs_jobs_in_post_order() {
        let mut home = HomeLoop::new();
        let handle = home.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            handle
                .post(Box::new(move || seen.lock().unwrap().push(i)))
                .unwrap();
        }

        assert_eq!(home.run_pending(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(home.run_pending(), 0);
    }

    #[test]
    fn jobs_run_on_the_driving_thread() {
        let mut home = HomeLoop::new();
        let handle = home.handle();
        let ran_on = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        thread::spawn(move || {
            handle
                .post(Box::new(move || {
                    *slot.lock().unwrap() = Some(thread::current().id());
                }))
                .unwrap();
        })
        .join()
        .unwrap();

        assert!(home.blocking_turn());
        assert_eq!(*ran_on.lock().unwrap(), Some(thread::current().id()));
    }

    #[test]
    fn post_after_close_fails() {
        let mut home = HomeLoop::new();
        let handle = home.handle();
        home.close();

        assert!(handle.is_closed());
        assert_eq!(handle.post(Box::new(|| {})), Err(CoreError::HomeClosed));
    }

    #[test]
    fn post_after_drop_fails() {
        let home = HomeLoop::new();
        let handle = home.handle();
        drop(home);

        assert_eq!(handle.post(Box::new(|| {})), Err(CoreError::HomeClosed));
    }

    #[tokio::test]
    async fn turn_reports_drained_after_close() {
        let mut home = HomeLoop::new();
        home.handle().post(Box::new(|| {})).unwrap();
        home.close();

        assert!(home.turn().await);
        assert!(!home.turn().await);
    }
}

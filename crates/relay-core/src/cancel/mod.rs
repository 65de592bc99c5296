//! Cooperative cancellation shared between the caller and one worker lane.
//!
//! The state lives in a [`CancellationToken`]; the mutex/condvar pair only exists so that a worker blocked in
//! [`CancelSignal::wait_timeout`] wakes up as soon as cancellation is requested.
use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use relay_model::TaskError;
use tokio_util::sync::CancellationToken;

struct Shared {
    token: CancellationToken,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Owner of a cancellation flag; the only writer.
#[derive(Clone)]
pub struct CancelController {
    shared: Arc<Shared>,
}

impl CancelController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                token: CancellationToken::new(),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Read-only view handed to the task.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Move the flag to requested and wake blocked waiters.
    ///
    /// Returns `true` only for the call that performed the transition; later calls are no-ops.
    pub fn request_cancel(&self) -> bool {
        let _guard = self
            .shared
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.shared.token.is_cancelled() {
            return false;
        }
        self.shared.token.cancel();
        self.shared.wake.notify_all();
        true
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl Default for CancelController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelController")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// Read-only cancellation view passed into [`Task::run`](crate::Task::run).
///
/// Once requested, it stays requested.
#[derive(Clone)]
pub struct CancelSignal {
    shared: Arc<Shared>,
}

impl CancelSignal {
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// `Err(TaskError::Canceled)` once cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<(), TaskError> {
        if self.is_requested() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Block for up to `timeout`, returning early when cancellation is requested.
    ///
    /// Returns whether cancellation was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .shared
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .shared
            .wake
            .wait_timeout_while(guard, timeout, |_| !self.shared.token.is_cancelled())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_requested()
    }

    /// Interruptible sleep: `Err(TaskError::Canceled)` if cancellation arrives before `duration` elapses.
    pub fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        if self.wait_timeout(duration) {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Child token for tasks that drive async code internally.
    ///
    /// Cancelling the child does not affect the run.
    pub fn token(&self) -> CancellationToken {
        self.shared.token.child_token()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.shared.token.cancelled().await
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("requested", &self.is_requested())
            .finish()
    }
}

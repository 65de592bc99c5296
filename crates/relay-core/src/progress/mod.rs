//! Progress notifications emitted by a task while it runs.
//!
//! A [`ProgressSubject`] is an explicit subscribe/unsubscribe registry. Its lifetime is tied to one run:
//! the synchronizer closes it when `run` returns, after which emissions are dropped and new subscriptions are inert.
use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::trace;

use crate::home::HomeContext;

type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registry<P> {
    next_id: u64,
    closed: bool,
    subscribers: BTreeMap<u64, Callback<P>>,
}

/// Type-erased view the synchronizer uses to end a run's progress stream.
pub trait ProgressSource: Send + Sync {
    /// Drop every subscriber and refuse further emissions.
    fn close(&self);
    fn is_closed(&self) -> bool;
    fn subscriber_count(&self) -> usize;
}

trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

impl<P: 'static> Unregister for Mutex<Registry<P>> {
    fn unregister(&self, id: u64) {
        let mut reg = self.lock().unwrap_or_else(PoisonError::into_inner);
        reg.subscribers.remove(&id);
    }
}

/// Multicast progress stream owned by a task.
pub struct ProgressSubject<P> {
    registry: Arc<Mutex<Registry<P>>>,
}

impl<P> Clone for ProgressSubject<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P> ProgressSubject<P>
where
    P: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                closed: false,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    /// Register `f` to run on the emitting lane for every notification.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&active);
        self.register(active, move |p: &P| {
            if gate.load(Ordering::Acquire) {
                f(p)
            }
        })
    }

    /// Register `f` to run on `home` for every notification, in emission order.
    ///
    /// Notifications already posted to `home` are discarded there if the subscription is no longer active when they run.
    pub fn observe_on<H, F>(&self, home: H, f: F) -> Subscription
    where
        H: HomeContext,
        F: Fn(&P) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&active);
        let f = Arc::new(f);
        self.register(active, move |p: &P| {
            let p = p.clone();
            let gate = Arc::clone(&gate);
            let f = Arc::clone(&f);
            let posted = home.post(Box::new(move || {
                if gate.load(Ordering::Acquire) {
                    f(&p)
                }
            }));
            if posted.is_err() {
                trace!("home context closed; progress notification dropped");
            }
        })
    }

    /// Fan `progress` out to the current subscribers. Returns how many received it.
    ///
    /// A no-op once the subject is closed.
    pub fn emit(&self, progress: P) -> usize {
        let callbacks: Vec<Callback<P>> = {
            let reg = self.lock();
            if reg.closed {
                return 0;
            }
            reg.subscribers.values().cloned().collect()
        };
        for cb in &callbacks {
            cb(&progress);
        }
        callbacks.len()
    }

    fn register<F>(&self, active: Arc<AtomicBool>, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut reg = self.lock();
        if reg.closed {
            active.store(false, Ordering::Release);
            return Subscription {
                id: None,
                active,
                registry: None,
            };
        }

        let id = reg.next_id;
        reg.next_id += 1;
        reg.subscribers.insert(id, Arc::new(f));

        let weak: Weak<Mutex<Registry<P>>> = Arc::downgrade(&self.registry);
        let registry: Weak<dyn Unregister> = weak;
        Subscription {
            id: Some(id),
            active,
            registry: Some(registry),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<P>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for ProgressSubject<P>
where
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProgressSource for ProgressSubject<P>
where
    P: Clone + Send + 'static,
{
    fn close(&self) {
        let mut reg = self.lock();
        reg.closed = true;
        reg.subscribers.clear();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl<P> fmt::Debug for ProgressSubject<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ProgressSubject")
            .field("closed", &reg.closed)
            .field("subscribers", &reg.subscribers.len())
            .finish()
    }
}

/// Registration handle returned by [`ProgressSubject::subscribe`] and [`ProgressSubject::observe_on`].
///
/// Dropping it unsubscribes; call [`Subscription::detach`] to keep the registration until the run ends.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Option<u64>,
    active: Arc<AtomicBool>,
    registry: Option<Weak<dyn Unregister>>,
}

impl Subscription {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop receiving notifications, including ones already posted to a home context.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    /// Keep the registration alive until the subject is closed.
    pub fn detach(mut self) {
        self.registry = None;
        self.id = None;
    }

    fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        if let (Some(id), Some(registry)) = (self.id.take(), self.registry.take())
            && let Some(registry) = registry.upgrade()
        {
            registry.unregister(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.is_some() {
            self.cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

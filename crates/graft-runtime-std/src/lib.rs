//! Lifecycle flush batching for drivers running on `std`.
//!
//! Mounting and destroying components queues `mounted`/`unmounted`
//! callbacks on a [`Scheduler`]. The first callback of a batch asks the
//! platform for a flush; [`StdScheduler`] turns that request into a flag
//! the driver's loop can poll and an optional waker for loops that sleep.
//! [`StdRuntime`] pairs the two so a driver only threads one value
//! through.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use graft_core::{Host, RuntimeScheduler, Scheduler};

type BatchWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Flush hook for the lifecycle queue. One request is raised per batch of
/// queued callbacks, however many the batch holds.
pub struct StdScheduler {
    batch_pending: AtomicBool,
    batch_waker: RwLock<Option<BatchWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            batch_pending: AtomicBool::new(false),
            batch_waker: RwLock::new(None),
        }
    }

    /// Whether a batch of lifecycle callbacks started since the last call.
    /// Clears the request.
    pub fn take_flush_request(&self) -> bool {
        self.batch_pending.swap(false, Ordering::SeqCst)
    }

    /// Called once at the start of every batch.
    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .batch_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_flush_waker(&self) {
        *self
            .batch_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .batch_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "batch_pending",
                &self.batch_pending.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_flush(&self) {
        self.batch_pending.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Lifecycle queue together with the flush hook it reports batches to.
/// Clones share both.
#[derive(Clone)]
pub struct StdRuntime {
    platform: Arc<StdScheduler>,
    scheduler: Scheduler,
}

impl StdRuntime {
    pub fn new() -> Self {
        let platform = Arc::new(StdScheduler::default());
        let scheduler = Scheduler::new(platform.clone());
        Self {
            platform,
            scheduler,
        }
    }

    /// Queue to hand to a [`graft_core::Reconciler`].
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    pub fn platform(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.platform)
    }

    pub fn take_flush_request(&self) -> bool {
        self.platform.take_flush_request()
    }

    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.platform.set_flush_waker(waker);
    }

    pub fn clear_flush_waker(&self) {
        self.platform.clear_flush_waker();
    }

    /// Drain the lifecycle queue when a batch is waiting. Returns how many
    /// callbacks ran, failed ones included.
    pub fn flush_if_requested(&self, host: &mut dyn Host) -> usize {
        if self.take_flush_request() {
            self.scheduler.flush(host)
        } else {
            0
        }
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("platform", &self.platform)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

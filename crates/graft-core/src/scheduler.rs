//! Deferred execution of lifecycle callbacks.
//!
//! Mounting and unmounting components enqueue their post-mount and
//! post-unmount callbacks here instead of running them inline. The first
//! job of a batch asks the platform for a flush, and [`Scheduler::flush`]
//! later runs every queued job in insertion order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::host::Host;
use crate::platform::{DefaultScheduler, RuntimeScheduler};
use crate::ReconcileError;

pub type Job = Box<dyn FnOnce(&mut dyn Host) -> Result<(), ReconcileError>>;

struct SchedulerInner {
    platform: Arc<dyn RuntimeScheduler>,
    jobs: RefCell<VecDeque<Job>>,
    flush_requested: Cell<bool>,
    flushing: Cell<bool>,
}

impl SchedulerInner {
    fn new(platform: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            platform,
            jobs: RefCell::new(VecDeque::new()),
            flush_requested: Cell::new(false),
            flushing: Cell::new(false),
        }
    }

    fn enqueue(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
        if !self.flush_requested.replace(true) {
            self.platform.schedule_flush();
        }
    }

    fn pop(&self) -> Option<Job> {
        self.jobs.borrow_mut().pop_front()
    }
}

/// FIFO queue of lifecycle jobs shared by everything mounted through one
/// driver. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(platform: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner::new(platform)),
        }
    }

    pub fn enqueue(
        &self,
        job: impl FnOnce(&mut dyn Host) -> Result<(), ReconcileError> + 'static,
    ) {
        self.inner.enqueue(Box::new(job));
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.inner.jobs.borrow().is_empty()
    }

    /// Whether a platform flush was requested and has not run yet.
    pub fn flush_requested(&self) -> bool {
        self.inner.flush_requested.get()
    }

    /// Run queued jobs until the queue is empty, including jobs enqueued by
    /// the jobs themselves. A failing job is logged and does not prevent
    /// the remaining jobs from running. Returns the number of jobs run.
    ///
    /// Calling `flush` from inside a job returns immediately; the outer
    /// flush drains whatever the job enqueued.
    pub fn flush(&self, host: &mut dyn Host) -> usize {
        if self.inner.flushing.replace(true) {
            return 0;
        }
        let mut ran = 0;
        while let Some(job) = self.inner.pop() {
            ran += 1;
            if let Err(err) = job(host) {
                log::error!("[scheduler]: lifecycle callback failed: {err}");
            }
        }
        self.inner.flush_requested.set(false);
        self.inner.flushing.set(false);
        ran
    }

    /// Force every pending callback to run now, without waiting for the
    /// platform. Used by tests and by drivers that need a settled tree.
    pub fn await_quiescence(&self, host: &mut dyn Host) -> usize {
        let mut ran = 0;
        while self.has_pending_jobs() && !self.inner.flushing.get() {
            ran += self.flush(host);
        }
        ran
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.inner.jobs.borrow().len())
            .field("flush_requested", &self.inner.flush_requested.get())
            .finish()
    }
}

//! Platform abstraction for the scheduler's deferred-flush boundary.
//!
//! The engine never decides on its own when deferred lifecycle callbacks
//! run. It asks the host platform to schedule a flush, and the platform
//! calls [`Scheduler::flush`](crate::Scheduler::flush) once the current
//! synchronous unit of work has finished.

/// Schedules deferred work for the reconciliation engine.
///
/// Implementations must be safe to share across threads even though the
/// engine itself is single-threaded, so a platform event loop can hold the
/// same handle.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run a scheduler flush after the current unit
    /// of work completes.
    fn schedule_flush(&self);
}

/// Scheduler hook that ignores flush requests.
///
/// Drivers using it flush explicitly, for example from tests or from a
/// render loop that flushes after every frame.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}

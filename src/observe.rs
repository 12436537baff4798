//! Hooks for watching lock traffic.
//!
//! A [`LockObserver`] installed on a [`Lock`](crate::Lock) is told whenever a
//! thread starts waiting for the lock, acquires it, and releases it. This is
//! the attachment point for instrumentation such as lock-order checkers and
//! deadlock detectors. The lock works identically with or without one.
use crate::thread::ThreadId;

/// Receives notifications about a [`Lock`](crate::Lock)'s acquisitions and
/// releases.
///
/// Every callback runs inside the lock's atomic region: the lock's spinlock is
/// held and preemption is disabled. Callbacks must therefore be short, and must
/// never block or touch the lock they are observing.
pub trait LockObserver: Send + Sync {
    /// `thread` is about to wait for the lock named `lock`.
    ///
    /// This is called on every blocking acquisition, before the lock is known
    /// to be contended, so that a checker sees the edge "`thread` wants
    /// `lock`" before the thread can sleep.
    fn waiting(&self, lock: &str, thread: ThreadId) {
        let _ = (lock, thread);
    }

    /// `thread` is now the holder of `lock`.
    fn acquired(&self, lock: &str, thread: ThreadId) {
        let _ = (lock, thread);
    }

    /// `thread` has released `lock`.
    fn released(&self, lock: &str, thread: ThreadId) {
        let _ = (lock, thread);
    }
}

/// A [`LockObserver`] which records lock traffic as `tracing` events at the
/// `TRACE` level, under the `ksynch::observe` target.
#[derive(Copy, Clone, Debug, Default)]
pub struct TraceObserver;

impl LockObserver for TraceObserver {
    fn waiting(&self, lock: &str, thread: ThreadId) {
        tracing::trace!(target: "ksynch::observe", lock, %thread, "waiting");
    }

    fn acquired(&self, lock: &str, thread: ThreadId) {
        tracing::trace!(target: "ksynch::observe", lock, %thread, "acquired");
    }

    fn released(&self, lock: &str, thread: ThreadId) {
        tracing::trace!(target: "ksynch::observe", lock, %thread, "released");
    }
}

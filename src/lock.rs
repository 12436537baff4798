//! A sleeping mutual exclusion lock which knows who holds it.
//!
//! See the documentation on the [`Lock`] type for details.
use crate::{
    error::{self, AllocError},
    loom::sync::atomic::{AtomicUsize, Ordering::*},
    observe::LockObserver,
    platform::{AtomicRegion, Platform, RawSpinlock, WaitQueue},
    thread::{Caller, ThreadId},
};
use alloc::string::String;
use core::fmt;


/// A sleeping [mutual exclusion] lock.
///
/// Unlike a spinlock, a `Lock` puts threads that find it held to sleep on a
/// wait queue, and [`release`] wakes one of them. Unlike most userspace
/// mutexes, a `Lock` does not contain the data it protects; it records the
/// [`ThreadId`] of its holder instead, so that misuse can be caught:
///
/// - acquiring a lock the caller already holds is a fatal error (a
///   `Lock` is not recursive);
/// - releasing a lock that the caller does not hold is a fatal error;
/// - [`held_by`] can be used in assertions, to check that the caller holds a
///   lock before touching the data it protects.
///
/// Both [`acquire`] and [`release`] take a [`Caller`], naming the thread on
/// whose behalf the operation is performed. [`lock`] wraps the pair in an RAII
/// [`LockGuard`].
///
/// # Fairness
///
/// This is *not* a fair lock. A thread woken by [`release`] must re-check the
/// lock, and may find that another thread acquired it first; in that case, it
/// goes back to sleep.
///
/// [mutual exclusion]: https://en.wikipedia.org/wiki/Mutual_exclusion
/// [`acquire`]: Self::acquire
/// [`release`]: Self::release
/// [`held_by`]: Self::held_by
/// [`lock`]: Self::lock
pub struct Lock<P: Platform> {
    name: String,
    /// The raw [`ThreadId`] of the holder, or [`UNHELD`].
    ///
    /// Only written inside the atomic region. Atomic so that `held_by` can read
    /// it without entering the region.
    holder: AtomicUsize,
    pub(crate) guard: P::Spin,
    queue: P::Queue,
    observer: Option<&'static dyn LockObserver>,
}

/// An RAII guard for a held [`Lock`]. When this structure is dropped (falls out
/// of scope), the lock is released on behalf of the [`Caller`] that acquired
/// it.
///
/// This structure is created by the [`lock`] method on [`Lock`].
///
/// [`lock`]: Lock::lock
#[must_use = "if unused, the `Lock` will immediately be released"]
pub struct LockGuard<'a, P: Platform> {
    lock: &'a Lock<P>,
    caller: Caller,
}

const UNHELD: usize = 0;

impl<P: Platform> Lock<P> {
    /// Returns a new, unheld lock named `name`.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the lock's name or wait queue could not be
    /// allocated. Anything allocated before the failure is freed.
    pub fn new(name: &str) -> Result<Self, AllocError> {
        let name = error::dup_name(name)?;
        let queue = P::Queue::new(&name)?;
        tracing::debug!(lock = %name, "Lock::new");
        Ok(Self {
            name,
            holder: AtomicUsize::new(UNHELD),
            guard: P::Spin::new(),
            queue,
            observer: None,
        })
    }

    /// Returns a new, unheld lock named `name`, which reports its acquisitions
    /// and releases to `observer`.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the lock's name or wait queue could not be
    /// allocated.
    pub fn with_observer(
        name: &str,
        observer: &'static dyn LockObserver,
    ) -> Result<Self, AllocError> {
        let mut lock = Self::new(name)?;
        lock.observer = Some(observer);
        Ok(lock)
    }

    /// Destroys this lock.
    ///
    /// # Panics
    ///
    /// If the lock is held, or if any thread is sleeping on it.
    pub fn destroy(self) {
        if let Some(holder) = self.holder() {
            fatal!("lock {:?} destroyed while held by {holder}", self.name);
        }
        if !self.queue.is_empty() {
            fatal!(
                "lock {:?} destroyed while threads are waiting on it",
                self.name
            );
        }
        tracing::debug!(lock = %self.name, "Lock::destroy");
    }

    /// Acquires this lock on behalf of `caller`, sleeping until it is free.
    ///
    /// # Panics
    ///
    /// - If `caller` is in interrupt context.
    /// - If `caller` already holds this lock.
    #[cfg_attr(test, track_caller)]
    pub fn acquire(&self, caller: &Caller) {
        caller.assert_can_block("Lock::acquire", &self.name);
        self.assert_not_held(caller);

        let mut region = AtomicRegion::<P>::enter(&self.guard);
        self.acquire_in(&mut region, caller);
    }

    /// Acquires this lock on behalf of `caller` if it is free, without
    /// sleeping. Returns `true` if the lock was acquired.
    ///
    /// Since this never blocks, it may be called from interrupt context.
    ///
    /// # Panics
    ///
    /// If `caller` already holds this lock.
    #[cfg_attr(test, track_caller)]
    pub fn try_acquire(&self, caller: &Caller) -> bool {
        self.assert_not_held(caller);

        let _region = AtomicRegion::<P>::enter(&self.guard);
        if self.holder.load(Relaxed) != UNHELD {
            return false;
        }
        self.set_holder(caller);
        true
    }

    /// Releases this lock on behalf of `caller`, waking one thread sleeping on
    /// it.
    ///
    /// # Panics
    ///
    /// If `caller` does not hold this lock.
    #[cfg_attr(test, track_caller)]
    pub fn release(&self, caller: &Caller) {
        let region = AtomicRegion::<P>::enter(&self.guard);
        self.release_in(&region, caller);
    }

    /// Acquires this lock on behalf of `caller`, returning a [`LockGuard`]
    /// which releases it when dropped.
    ///
    /// # Panics
    ///
    /// As for [`acquire`](Self::acquire).
    #[cfg_attr(test, track_caller)]
    pub fn lock(&self, caller: &Caller) -> LockGuard<'_, P> {
        self.acquire(caller);
        LockGuard {
            lock: self,
            caller: *caller,
        }
    }

    /// Returns `true` if `caller` holds this lock.
    ///
    /// This never blocks or spins, and is suitable for assertions such as
    /// `debug_assert!(lock.held_by(caller))`.
    #[must_use]
    pub fn held_by(&self, caller: &Caller) -> bool {
        // Only `caller` itself can store its own ID here, so a stale read can
        // never make this wrong about `caller`.
        self.holder.load(Acquire) == caller.id().get()
    }

    /// Returns the thread currently holding this lock, if any.
    ///
    /// The holder may have changed by the time this returns.
    #[must_use]
    pub fn holder(&self) -> Option<ThreadId> {
        ThreadId::new(self.holder.load(Acquire))
    }

    /// Returns this lock's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sleeps until the lock is free, then makes `caller` its holder.
    ///
    /// Shared with `ConditionVariable::wait`, which reacquires the lock without
    /// leaving the region it released the lock in.
    pub(crate) fn acquire_in(&self, region: &mut AtomicRegion<'_, P>, caller: &Caller) {
        if let Some(observer) = self.observer {
            observer.waiting(&self.name, caller.id());
        }

        while self.holder.load(Relaxed) != UNHELD {
            trace!(lock = %self.name, thread = %caller.id(), "Lock::acquire: sleeping");
            region.sleep_on(&self.queue);
        }

        self.set_holder(caller);
    }

    /// Clears the holder and wakes one sleeper.
    ///
    /// Shared with `ConditionVariable::wait`, which must release the lock and
    /// go to sleep on its own queue without leaving the region.
    #[cfg_attr(test, track_caller)]
    pub(crate) fn release_in(&self, region: &AtomicRegion<'_, P>, caller: &Caller) {
        let holder = self.holder.load(Relaxed);
        if holder != caller.id().get() {
            match ThreadId::new(holder) {
                Some(holder) => fatal!(
                    "lock {:?} released by {}, but it is held by {holder}",
                    self.name,
                    caller.id()
                ),
                None => fatal!(
                    "lock {:?} released by {}, but it is not held",
                    self.name,
                    caller.id()
                ),
            }
        }

        self.holder.store(UNHELD, Release);
        trace!(lock = %self.name, thread = %caller.id(), "Lock::release");
        region.wake_one(&self.queue);

        if let Some(observer) = self.observer {
            observer.released(&self.name, caller.id());
        }
    }

    #[cfg_attr(test, track_caller)]
    pub(crate) fn assert_held(&self, caller: &Caller, op: &str) {
        if !self.held_by(caller) {
            fatal!(
                "{op} requires {} to hold lock {:?}, but it does not",
                caller.id(),
                self.name
            );
        }
    }

    #[cfg_attr(test, track_caller)]
    fn assert_not_held(&self, caller: &Caller) {
        if self.held_by(caller) {
            fatal!(
                "{} tried to acquire lock {:?}, which it already holds",
                caller.id(),
                self.name
            );
        }
    }

    /// Must be called inside the atomic region, with the lock unheld.
    fn set_holder(&self, caller: &Caller) {
        debug_assert!(self.guard.is_locked());
        self.holder.store(caller.id().get(), Release);
        trace!(lock = %self.name, thread = %caller.id(), "Lock::acquire: acquired");

        if let Some(observer) = self.observer {
            observer.acquired(&self.name, caller.id());
        }
    }
}

impl<P: Platform> fmt::Debug for Lock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("holder", &self.holder())
            .field("waiters", &!self.queue.is_empty())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

// === impl LockGuard ===

impl<'a, P: Platform> LockGuard<'a, P> {
    /// Returns the [`Lock`] this guard holds.
    #[must_use]
    pub fn lock(&self) -> &'a Lock<P> {
        self.lock
    }

    /// Returns the [`Caller`] on whose behalf the lock is held.
    #[must_use]
    pub fn caller(&self) -> &Caller {
        &self.caller
    }
}

impl<P: Platform> Drop for LockGuard<'_, P> {
    #[cfg_attr(test, track_caller)]
    fn drop(&mut self) {
        self.lock.release(&self.caller);
    }
}

impl<P: Platform> fmt::Debug for LockGuard<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock.name)
            .field("caller", &self.caller)
            .finish()
    }
}

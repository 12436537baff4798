//! A counting semaphore.
//!
//! See the documentation on the [`Semaphore`] type for details.
use crate::{
    error::{self, AllocError},
    loom::cell::UnsafeCell,
    platform::{AtomicRegion, Platform, RawSpinlock, WaitQueue},
    thread::Caller,
};
use alloc::string::String;
use core::fmt;


/// A counting [semaphore].
///
/// A semaphore holds a count of available units of some resource. [`down`]
/// (Dijkstra's *P*) takes a unit, sleeping until one is available; [`up`]
/// (*V*) returns a unit and wakes a sleeper, if there is one.
///
/// # Fairness
///
/// This is *not* a fair semaphore. When a unit becomes available, any thread
/// may take it: a thread woken by [`up`] has to re-check the count, and may
/// find that a thread which arrived later has already taken the unit. In that
/// case, it goes back to sleep.
///
/// # Destruction
///
/// A semaphore must be torn down with [`destroy`] once it is no longer needed.
/// Destroying a semaphore that still has sleepers is a fatal error.
///
/// [semaphore]: https://en.wikipedia.org/wiki/Semaphore_(programming)
/// [`down`]: Self::down
/// [`up`]: Self::up
/// [`destroy`]: Self::destroy
pub struct Semaphore<P: Platform> {
    name: String,
    count: UnsafeCell<usize>,
    guard: P::Spin,
    queue: P::Queue,
}

// Safety: `count` is only accessed while `guard` is held.
unsafe impl<P> Send for Semaphore<P>
where
    P: Platform,
    P::Spin: Send,
    P::Queue: Send,
{
}
unsafe impl<P> Sync for Semaphore<P>
where
    P: Platform,
    P::Spin: Sync,
    P::Queue: Sync,
{
}

impl<P: Platform> Semaphore<P> {
    /// Returns a new semaphore named `name`, with `count` units available.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the semaphore's name or wait queue could not
    /// be allocated. Anything allocated before the failure is freed.
    pub fn new(name: &str, count: usize) -> Result<Self, AllocError> {
        let name = error::dup_name(name)?;
        let queue = P::Queue::new(&name)?;
        tracing::debug!(semaphore = %name, count, "Semaphore::new");
        Ok(Self {
            name,
            count: UnsafeCell::new(count),
            guard: P::Spin::new(),
            queue,
        })
    }

    /// Destroys this semaphore.
    ///
    /// # Panics
    ///
    /// If any thread is sleeping on the semaphore. Such a thread would never be
    /// woken.
    pub fn destroy(self) {
        if !self.queue.is_empty() {
            fatal!(
                "semaphore {:?} destroyed while threads are waiting on it",
                self.name
            );
        }
        tracing::debug!(semaphore = %self.name, "Semaphore::destroy");
    }

    /// Takes a unit (*P*), sleeping until one is available.
    ///
    /// # Panics
    ///
    /// If `caller` is in interrupt context. This is checked on every call,
    /// even if a unit is available and the caller would not have slept.
    #[cfg_attr(test, track_caller)]
    pub fn down(&self, caller: &Caller) {
        caller.assert_can_block("Semaphore::down", &self.name);

        let mut region = AtomicRegion::<P>::enter(&self.guard);
        while self.load() == 0 {
            trace!(semaphore = %self.name, thread = %caller.id(), "Semaphore::down: sleeping");
            region.sleep_on(&self.queue);
        }

        self.count.with_mut(|count| unsafe {
            // Safety: we are inside the atomic region.
            *count -= 1;
        });
        trace!(semaphore = %self.name, thread = %caller.id(), "Semaphore::down: acquired");
        drop(region);
    }

    /// Takes a unit if one is available, without sleeping. Returns `true` if a
    /// unit was taken.
    ///
    /// Since this never blocks, it may be called from interrupt context.
    pub fn try_down(&self) -> bool {
        let _region = AtomicRegion::<P>::enter(&self.guard);
        self.count.with_mut(|count| unsafe {
            // Safety: we are inside the atomic region.
            if *count == 0 {
                return false;
            }
            *count -= 1;
            true
        })
    }

    /// Returns a unit (*V*), waking at most one sleeping thread.
    ///
    /// This never blocks, and may be called from interrupt context.
    ///
    /// # Panics
    ///
    /// If the count would overflow.
    #[cfg_attr(test, track_caller)]
    pub fn up(&self) {
        let region = AtomicRegion::<P>::enter(&self.guard);
        self.count.with_mut(|count| unsafe {
            // Safety: we are inside the atomic region.
            *count = match (*count).checked_add(1) {
                Some(next) => next,
                None => fatal!("semaphore {:?} count overflowed", self.name),
            };
        });
        trace!(semaphore = %self.name, "Semaphore::up");
        region.wake_one(&self.queue);
    }

    /// Returns the number of units available right now.
    ///
    /// By the time this returns, the count may already have changed. This is
    /// meant for diagnostics and tests, not for deciding whether to call
    /// [`down`](Self::down).
    #[must_use]
    pub fn count(&self) -> usize {
        let _region = AtomicRegion::<P>::enter(&self.guard);
        self.load()
    }

    /// Returns this semaphore's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Must be called with `guard` held.
    fn load(&self) -> usize {
        debug_assert!(self.guard.is_locked());
        self.count.with(|count| unsafe { *count })
    }
}

impl<P: Platform> fmt::Debug for Semaphore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("waiters", &!self.queue.is_empty())
            .finish_non_exhaustive()
    }
}

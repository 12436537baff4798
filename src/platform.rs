//! The interface between the primitives and the kernel underneath them.
//!
//! Semaphores, locks and condition variables need three things they cannot
//! provide for themselves:
//!
//! - a [`RawSpinlock`], protecting each primitive's internal state against
//!   other CPUs and against interrupt handlers;
//! - a [`WaitQueue`], which can suspend the calling thread while atomically
//!   releasing that spinlock, and later make it runnable again;
//! - control over the preemption level, so that the "check, then sleep" and
//!   "clear, then wake" sequences cannot be split by an interrupt.
//!
//! A kernel supplies all three by implementing [`Platform`]. The primitives
//! only ever use them through an [`AtomicRegion`], which pairs the raised
//! preemption level with the held spinlock and undoes both on every exit path.
use crate::error::AllocError;
use core::fmt;

/// A raw spinlock, usable from any context, including interrupt handlers.
///
/// This is the lowest-level lock in the system: it never puts the caller to
/// sleep, so it may be taken where blocking is forbidden.
///
/// # Safety
///
/// Implementations must ensure that the lock is actually exclusive: it can't
/// be acquired while it is already locked. A successful [`lock`] or
/// [`try_lock`] must synchronize-with the [`unlock`] that preceded it.
///
/// [`lock`]: RawSpinlock::lock
/// [`try_lock`]: RawSpinlock::try_lock
/// [`unlock`]: RawSpinlock::unlock
pub unsafe trait RawSpinlock {
    /// Returns a new spinlock, in the unlocked state.
    fn new() -> Self
    where
        Self: Sized;

    /// Acquires this spinlock, spinning until it is able to do so.
    fn lock(&self);

    /// Attempts to acquire this spinlock without spinning. Returns `true` if
    /// the lock was acquired.
    fn try_lock(&self) -> bool;

    /// Releases this spinlock.
    ///
    /// # Safety
    ///
    /// The lock must be held in the current context, i.e. this must be paired
    /// with a successful call to [`lock`](Self::lock) or
    /// [`try_lock`](Self::try_lock).
    unsafe fn unlock(&self);

    /// Returns `true` if the spinlock is currently locked.
    fn is_locked(&self) -> bool;
}

/// A queue of threads blocked on some event.
///
/// A wait queue does not decide *when* its threads should run; it is always
/// driven by a primitive, which holds a spinlock `S` while it inspects its own
/// state and then either sleeps on the queue or wakes threads from it. Every
/// method that touches the queue's waiters is called with that spinlock held,
/// so implementations may rely on it to protect their own state.
///
/// # Safety
///
/// [`sleep`](Self::sleep) must register the calling thread as a waiter *before*
/// releasing the spinlock. Otherwise, a wakeup issued between the unlock and
/// the registration is lost, and the thread sleeps forever.
pub unsafe trait WaitQueue<S: RawSpinlock> {
    /// Creates a new, empty wait queue. `label` names the queue for
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the queue's state could not be allocated.
    fn new(label: &str) -> Result<Self, AllocError>
    where
        Self: Sized;

    /// Suspends the calling thread until it is woken by
    /// [`wake_one`](Self::wake_one) or [`wake_all`](Self::wake_all).
    ///
    /// The calling thread is added to the queue and `spin` is released, as a
    /// single atomic step with respect to anyone else who takes `spin`. Before
    /// this method returns, `spin` is acquired again.
    ///
    /// Returning does not imply that whatever the caller was waiting for has
    /// happened. Callers must re-check their condition in a loop.
    ///
    /// # Safety
    ///
    /// `spin` must be held by the caller.
    unsafe fn sleep(&self, spin: &S);

    /// Makes at most one thread sleeping on this queue runnable.
    ///
    /// # Safety
    ///
    /// `spin` must be held by the caller, and must be the same spinlock that
    /// sleepers on this queue release.
    unsafe fn wake_one(&self, spin: &S);

    /// Makes every thread sleeping on this queue runnable.
    ///
    /// # Safety
    ///
    /// `spin` must be held by the caller, and must be the same spinlock that
    /// sleepers on this queue release.
    unsafe fn wake_all(&self, spin: &S);

    /// Returns `true` if no threads are sleeping on this queue.
    fn is_empty(&self) -> bool;
}

/// A kernel's implementation of the services the primitives depend on.
///
/// This is a type-level bundle: platforms are never instantiated, and the
/// preemption level is per-CPU (or per-thread) state reached through
/// associated functions.
pub trait Platform: 'static {
    /// The spinlock protecting each primitive's internal state.
    type Spin: RawSpinlock;

    /// The wait queue on which blocked threads sleep.
    type Queue: WaitQueue<Self::Spin>;

    /// A saved preemption level, as returned by [`raise`](Self::raise).
    type Level: Copy;

    /// Raises the preemption level to its highest value, so that the current
    /// thread cannot be preempted and local interrupts are not delivered.
    /// Returns the previous level.
    fn raise() -> Self::Level;

    /// Restores a preemption level previously returned by
    /// [`raise`](Self::raise).
    fn restore(level: Self::Level);
}

/// A scoped atomic region: the preemption level is raised and a primitive's
/// spinlock is held for as long as this value lives.
///
/// Dropping the region releases the spinlock and then restores the saved
/// preemption level. This happens on every exit path, including a fatal error
/// unwinding out of the region.
///
/// While inside the region, the holder may [sleep](Self::sleep_on) on a wait
/// queue; the spinlock is released for the duration of the sleep and is held
/// again when `sleep_on` returns.
#[must_use = "an atomic region ends as soon as it is dropped"]
pub struct AtomicRegion<'a, P: Platform> {
    spin: &'a P::Spin,
    level: P::Level,
}

// === impl AtomicRegion ===

impl<'a, P: Platform> AtomicRegion<'a, P> {
    /// Enters an atomic region guarded by `spin`, raising the preemption level
    /// and then acquiring the spinlock.
    #[cfg_attr(test, track_caller)]
    pub fn enter(spin: &'a P::Spin) -> Self {
        let level = P::raise();
        spin.lock();
        Self { spin, level }
    }

    /// Sleeps on `queue`, releasing this region's spinlock while asleep.
    ///
    /// The spinlock is held again when this returns. Taking `&mut self` keeps
    /// anything borrowed from the region from being used across the sleep.
    pub fn sleep_on(&mut self, queue: &P::Queue) {
        unsafe {
            // Safety: the spinlock is held for as long as `self` exists.
            queue.sleep(self.spin)
        }
    }

    /// Wakes at most one thread sleeping on `queue`.
    pub fn wake_one(&self, queue: &P::Queue) {
        unsafe {
            // Safety: the spinlock is held for as long as `self` exists.
            queue.wake_one(self.spin)
        }
    }

    /// Wakes every thread sleeping on `queue`.
    pub fn wake_all(&self, queue: &P::Queue) {
        unsafe {
            // Safety: the spinlock is held for as long as `self` exists.
            queue.wake_all(self.spin)
        }
    }
}

impl<P: Platform> Drop for AtomicRegion<'_, P> {
    #[cfg_attr(test, track_caller)]
    fn drop(&mut self) {
        unsafe {
            // Safety: the spinlock was acquired in `enter`, and `sleep_on`
            // always returns with it held again.
            self.spin.unlock();
        }
        P::restore(self.level);
    }
}

impl<P: Platform> fmt::Debug for AtomicRegion<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicRegion")
            .field("platform", &core::any::type_name::<P>())
            .finish_non_exhaustive()
    }
}

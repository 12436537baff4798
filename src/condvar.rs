//! A Mesa-style condition variable.
//!
//! See the documentation on the [`ConditionVariable`] type for details.
use crate::{
    error::{self, AllocError},
    lock::Lock,
    platform::{AtomicRegion, Platform, WaitQueue},
    thread::Caller,
};
use alloc::string::String;
use core::fmt;

#[cfg(test)]
mod tests;

/// A [condition variable] with Mesa semantics, used together with a [`Lock`].
///
/// A thread holding a lock can [`wait`] on a condition variable, atomically
/// releasing the lock and going to sleep until another thread holding the same
/// lock calls [`signal`] or [`broadcast`]. The waiter reacquires the lock
/// before `wait` returns.
///
/// Under Mesa semantics, a signal is only a hint: by the time a woken waiter
/// gets the lock back, another thread may already have invalidated whatever
/// condition it was waiting for. Waiters must always re-check their condition
/// in a loop:
///
/// ```
/// # use ksynch::{hosted::{self, Hosted}, ConditionVariable, Lock};
/// # let lock = Lock::<Hosted>::new("lock").unwrap();
/// # let cv = ConditionVariable::<Hosted>::new("cv").unwrap();
/// # let me = hosted::current();
/// # let ready = || true;
/// lock.acquire(&me);
/// while !ready() {
///     cv.wait(&lock, &me);
/// }
/// // ... the condition holds, and `me` holds `lock` ...
/// lock.release(&me);
/// ```
///
/// [`wait_while`] packages this loop.
///
/// A condition variable has no state besides its queue of waiters, and borrows
/// the atomic region of the lock it is used with. Every thread waiting on, or
/// signalling, a given condition variable at the same time must therefore use
/// the same lock.
///
/// [condition variable]: https://en.wikipedia.org/wiki/Monitor_(synchronization)#Condition_variables
/// [`wait`]: Self::wait
/// [`signal`]: Self::signal
/// [`broadcast`]: Self::broadcast
/// [`wait_while`]: Self::wait_while
pub struct ConditionVariable<P: Platform> {
    name: String,
    queue: P::Queue,
}

impl<P: Platform> ConditionVariable<P> {
    /// Returns a new condition variable named `name`, with no waiters.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocError`] if the name or wait queue could not be
    /// allocated.
    pub fn new(name: &str) -> Result<Self, AllocError> {
        let name = error::dup_name(name)?;
        let queue = P::Queue::new(&name)?;
        tracing::debug!(condvar = %name, "ConditionVariable::new");
        Ok(Self { name, queue })
    }

    /// Destroys this condition variable.
    ///
    /// # Panics
    ///
    /// If any thread is waiting on it.
    pub fn destroy(self) {
        if !self.queue.is_empty() {
            fatal!(
                "condition variable {:?} destroyed while threads are waiting on it",
                self.name
            );
        }
        tracing::debug!(condvar = %self.name, "ConditionVariable::destroy");
    }

    /// Releases `lock`, sleeps until signalled, and then reacquires `lock`.
    ///
    /// Releasing the lock and joining this condition variable's queue happen
    /// as one step: no other thread can acquire `lock` and signal in between,
    /// so a signal sent after the caller released the lock is never missed.
    ///
    /// The wakeup may be spurious, and the condition the caller waited for
    /// may no longer hold once the lock is reacquired.
    ///
    /// # Panics
    ///
    /// - If `caller` is in interrupt context.
    /// - If `caller` does not hold `lock`.
    #[cfg_attr(test, track_caller)]
    pub fn wait(&self, lock: &Lock<P>, caller: &Caller) {
        caller.assert_can_block("ConditionVariable::wait", &self.name);
        lock.assert_held(caller, "ConditionVariable::wait");

        let mut region = AtomicRegion::<P>::enter(&lock.guard);
        lock.release_in(&region, caller);

        trace!(condvar = %self.name, thread = %caller.id(), "ConditionVariable::wait: sleeping");
        region.sleep_on(&self.queue);
        trace!(condvar = %self.name, thread = %caller.id(), "ConditionVariable::wait: woke");

        lock.acquire_in(&mut region, caller);
    }

    /// Waits on this condition variable for as long as `condition` returns
    /// `true`.
    ///
    /// `condition` is always evaluated with `lock` held, once before the first
    /// wait and again after every wakeup.
    ///
    /// # Panics
    ///
    /// As for [`wait`](Self::wait). The checks are made even if `condition`
    /// is already `false`.
    #[cfg_attr(test, track_caller)]
    pub fn wait_while(
        &self,
        lock: &Lock<P>,
        caller: &Caller,
        mut condition: impl FnMut() -> bool,
    ) {
        caller.assert_can_block("ConditionVariable::wait_while", &self.name);
        lock.assert_held(caller, "ConditionVariable::wait_while");

        while condition() {
            self.wait(lock, caller);
        }
    }

    /// Wakes at most one thread waiting on this condition variable.
    ///
    /// The woken thread does not run until it can reacquire `lock`, which the
    /// caller continues to hold.
    ///
    /// # Panics
    ///
    /// If `caller` does not hold `lock`.
    #[cfg_attr(test, track_caller)]
    pub fn signal(&self, lock: &Lock<P>, caller: &Caller) {
        lock.assert_held(caller, "ConditionVariable::signal");
        let region = AtomicRegion::<P>::enter(&lock.guard);
        trace!(condvar = %self.name, thread = %caller.id(), "ConditionVariable::signal");
        region.wake_one(&self.queue);
    }

    /// Wakes every thread waiting on this condition variable.
    ///
    /// # Panics
    ///
    /// If `caller` does not hold `lock`.
    #[cfg_attr(test, track_caller)]
    pub fn broadcast(&self, lock: &Lock<P>, caller: &Caller) {
        lock.assert_held(caller, "ConditionVariable::broadcast");
        let region = AtomicRegion::<P>::enter(&lock.guard);
        trace!(condvar = %self.name, thread = %caller.id(), "ConditionVariable::broadcast");
        region.wake_all(&self.queue);
    }

    /// Returns this condition variable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P: Platform> fmt::Debug for ConditionVariable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("name", &self.name)
            .field("waiters", &!self.queue.is_empty())
            .finish()
    }
}

//! A spinlock for bare metal and for the hosted platform.
//!
//! [`Spinlock`] is the [`RawSpinlock`] used by the [`hosted`] platform, and is
//! also a reasonable choice for kernels which don't have their own. Note that
//! it does nothing about interrupts; a kernel taking it from interrupt handlers
//! must also raise the preemption level, which [`AtomicRegion`] does.
//!
//! [`hosted`]: crate::hosted
//! [`AtomicRegion`]: crate::AtomicRegion
use crate::platform::RawSpinlock;
use core::fmt;

#[cfg(not(loom))]
use core::sync::atomic::{AtomicBool, Ordering::*};

/// A test-and-test-and-set [`RawSpinlock`].
///
/// Contended callers spin on a plain load, backing off exponentially between
/// attempts, and only retry the compare-and-swap once the lock looks free.
///
/// # Fairness
///
/// This is *not* a fair lock.
///
/// # Loom-specific behavior
///
/// When `cfg(loom)` is enabled, the lock is a flag behind a loom `Mutex`, and
/// contended callers block on a `Condvar` until the flag is cleared. Every
/// failed check of a spin loop is another branch for loom to explore, so a
/// model with three contending threads would exceed loom's branch limit.
pub struct Spinlock {
    #[cfg(not(loom))]
    locked: AtomicBool,

    #[cfg(loom)]
    locked: loom::sync::Mutex<bool>,
    #[cfg(loom)]
    unlocked: loom::sync::Condvar,
}

/// Exponential backoff for the contended path of [`Spinlock::lock`].
#[cfg(not(loom))]
#[derive(Debug)]
struct Backoff {
    shift: u8,
}

// === impl Spinlock ===

impl Spinlock {
    /// Returns a new `Spinlock`, in the unlocked state.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Returns a new `Spinlock`, in the unlocked state.
    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            locked: loom::sync::Mutex::new(false),
            unlocked: loom::sync::Condvar::new(),
        }
    }

    #[cfg(loom)]
    fn flag(&self) -> loom::sync::MutexGuard<'_, bool> {
        // The flag is never left half-written, so a poisoned mutex is still
        // usable.
        self.locked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Spinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinlock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(not(loom))]
unsafe impl RawSpinlock for Spinlock {
    fn new() -> Self {
        Spinlock::new()
    }

    #[cfg_attr(test, track_caller)]
    fn lock(&self) {
        let mut backoff = Backoff::new();
        while !self.try_lock() {
            while test_dbg!(self.is_locked()) {
                backoff.spin();
            }
        }
    }

    #[cfg_attr(test, track_caller)]
    #[inline]
    fn try_lock(&self) -> bool {
        test_dbg!(self
            .locked
            .compare_exchange(false, true, Acquire, Relaxed)
            .is_ok())
    }

    #[cfg_attr(test, track_caller)]
    #[inline]
    unsafe fn unlock(&self) {
        test_dbg!(self.locked.store(false, Release));
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Relaxed)
    }
}

#[cfg(loom)]
unsafe impl RawSpinlock for Spinlock {
    fn new() -> Self {
        Spinlock::new()
    }

    fn lock(&self) {
        let mut locked = self.flag();
        while *locked {
            locked = self
                .unlocked
                .wait(locked)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *locked = true;
    }

    fn try_lock(&self) -> bool {
        let mut locked = self.flag();
        !core::mem::replace(&mut *locked, true)
    }

    unsafe fn unlock(&self) {
        *self.flag() = false;
        self.unlocked.notify_one();
    }

    fn is_locked(&self) -> bool {
        *self.flag()
    }
}

// === impl Backoff ===

#[cfg(not(loom))]
impl Backoff {
    /// Stop doubling once a single backoff is 2^8 spins long.
    const MAX_SHIFT: u8 = 8;

    const fn new() -> Self {
        Self { shift: 0 }
    }

    #[inline]
    fn spin(&mut self) {
        for _ in 0..(1u32 << self.shift) {
            core::hint::spin_loop();
        }
        self.shift = (self.shift + 1).min(Self::MAX_SHIFT);
    }
}

//! A [`Platform`] backed by OS threads.
//!
//! The hosted platform lets the primitives run in an ordinary userspace
//! process: sleeping threads are parked with [`std::thread::park`], and the
//! preemption level is a per-thread counter that does not affect the OS
//! scheduler at all. It is intended for tests, simulators, and for exercising
//! kernel subsystems outside of the kernel.
//!
//! Thread identities are still explicit. [`current`] hands out one
//! [`ThreadId`] per OS thread, but callers remain free to build their own
//! [`Caller`]s instead.
use crate::{
    error::{self, AllocError},
    loom::{
        sync::{
            atomic::{AtomicBool, Ordering::*},
            Arc, Mutex,
        },
        thread,
    },
    platform::{Platform, RawSpinlock, WaitQueue},
    spin::Spinlock,
    thread::{Caller, ThreadId},
};
use alloc::{collections::VecDeque, string::String};
use core::{
    cell::Cell,
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// The hosted [`Platform`].
///
/// - `Spin` is a [`Spinlock`].
/// - `Queue` is a [`ParkQueue`].
/// - `Level` is the depth of nested atomic regions on the current OS thread,
///   readable with [`preemption_level`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Hosted;

/// A [`WaitQueue`] which parks OS threads.
///
/// Each sleeper pushes a waiter record carrying its [`std::thread::Thread`]
/// handle and then parks until a waker has flagged that record. Because the
/// flag is set before the thread is unparked, a wakeup which races with the
/// sleeper going to sleep is never lost.
pub struct ParkQueue {
    label: String,
    waiters: Mutex<VecDeque<Arc<Waiter>>>,
}

struct Waiter {
    thread: thread::Thread,
    woken: AtomicBool,
}

crate::loom::thread_local! {
    static LEVEL: Cell<usize> = Cell::new(0);
    static CURRENT: Cell<Option<ThreadId>> = Cell::new(None);
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Returns the number of atomic regions the current OS thread is inside.
///
/// Outside of any primitive operation this is always zero; tests use it to
/// check that every region was exited, even on error paths.
#[must_use]
pub fn preemption_level() -> usize {
    LEVEL.with(Cell::get)
}

/// Returns a [`Caller`] for the current OS thread, in thread context.
///
/// The first call on each OS thread assigns it a fresh [`ThreadId`]; later
/// calls on the same thread return the same identity.
#[must_use]
pub fn current() -> Caller {
    let id = CURRENT.with(|current| match current.get() {
        Some(id) => id,
        None => {
            let id = next_thread_id();
            current.set(Some(id));
            id
        }
    });
    Caller::thread(id)
}

/// Returns a [`ThreadId`] that no other call to this function (or to
/// [`current`]) has returned.
#[must_use]
pub fn next_thread_id() -> ThreadId {
    let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    match ThreadId::new(raw) {
        Some(id) => id,
        None => fatal!("hosted thread IDs exhausted"),
    }
}

// === impl Hosted ===

impl Platform for Hosted {
    type Spin = Spinlock;
    type Queue = ParkQueue;
    type Level = usize;

    fn raise() -> usize {
        LEVEL.with(|level| {
            let prev = level.get();
            level.set(prev + 1);
            prev
        })
    }

    fn restore(level: usize) {
        LEVEL.with(|current| {
            debug_assert!(
                current.get() > level,
                "restoring preemption level {level} from {}, regions exited out of order",
                current.get()
            );
            current.set(level)
        })
    }
}

// === impl ParkQueue ===

impl ParkQueue {
    /// Returns the number of threads currently sleeping on this queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters().len()
    }

    /// Returns this queue's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn waiters(&self) -> crate::loom::sync::MutexGuard<'_, VecDeque<Arc<Waiter>>> {
        // Nothing panics while holding this lock, so poisoning can only come
        // from a thread dying in the middle of `push_back`. The queue is still
        // structurally valid in that case.
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wake(&self, waiter: Arc<Waiter>) {
        trace!(queue = %self.label, "ParkQueue: waking");
        waiter.woken.store(true, Release);
        waiter.thread.unpark();
    }
}

unsafe impl WaitQueue<Spinlock> for ParkQueue {
    fn new(label: &str) -> Result<Self, AllocError> {
        Ok(Self {
            label: error::dup_name(label)?,
            waiters: Mutex::new(VecDeque::new()),
        })
    }

    unsafe fn sleep(&self, spin: &Spinlock) {
        let waiter = Arc::new(Waiter {
            thread: thread::current(),
            woken: AtomicBool::new(false),
        });
        // Register before unlocking: a waker must hold `spin` to find us, so
        // once we are in the queue, no wakeup can slip past.
        self.waiters().push_back(waiter.clone());
        trace!(queue = %self.label, "ParkQueue: sleeping");
        spin.unlock();

        while !waiter.woken.load(Acquire) {
            thread::park();
        }

        trace!(queue = %self.label, "ParkQueue: woke");
        spin.lock();
    }

    unsafe fn wake_one(&self, _: &Spinlock) {
        let waiter = self.waiters().pop_front();
        if let Some(waiter) = waiter {
            self.wake(waiter);
        }
    }

    unsafe fn wake_all(&self, _: &Spinlock) {
        let waiters = core::mem::take(&mut *self.waiters());
        for waiter in waiters {
            self.wake(waiter);
        }
    }

    fn is_empty(&self) -> bool {
        self.waiters().is_empty()
    }
}

impl fmt::Debug for ParkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkQueue")
            .field("label", &self.label)
            .field("waiters", &self.len())
            .finish()
    }
}

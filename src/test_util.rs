use crate::{
    error::AllocError,
    platform::{Platform, WaitQueue},
    spin::Spinlock,
    thread::{Caller, ThreadId},
};

#[cfg(not(loom))]
pub(crate) fn trace_init() -> impl Drop {
    use tracing_subscriber::{prelude::*, EnvFilter};
    let filter = EnvFilter::from_env("RUST_LOG");
    tracing_subscriber::fmt()
        .with_test_writer()
        .without_time()
        .with_env_filter(filter)
        .with_thread_names(true)
        .set_default()
}

#[cfg(loom)]
pub(crate) fn trace_init() -> impl Drop {
    use tracing_subscriber::{prelude::*, EnvFilter};
    let filter = EnvFilter::from_env("LOOM_LOG");
    tracing_subscriber::fmt()
        .with_test_writer()
        .without_time()
        .with_env_filter(filter)
        .set_default()
}

/// Returns a thread-context `Caller` with the raw ID `id`.
pub(crate) fn caller(id: usize) -> Caller {
    Caller::thread(ThreadId::new(id).expect("test thread IDs are non-zero"))
}

/// A platform whose wait queues always claim to have a sleeper.
///
/// Safe code cannot drop a primitive while another thread is blocked on it,
/// since the blocked thread borrows it. This lets tests reach the "destroyed
/// with waiters" checks anyway.
#[derive(Debug)]
pub(crate) struct Occupied;

#[derive(Debug)]
pub(crate) struct OccupiedQueue;

/// A platform whose wait queues can never be allocated.
#[derive(Debug)]
pub(crate) struct OutOfMemory;

#[derive(Debug)]
pub(crate) struct NoQueue;

impl Platform for Occupied {
    type Spin = Spinlock;
    type Queue = OccupiedQueue;
    type Level = ();

    fn raise() -> Self::Level {}
    fn restore(_: Self::Level) {}
}

unsafe impl WaitQueue<Spinlock> for OccupiedQueue {
    fn new(_: &str) -> Result<Self, AllocError> {
        Ok(Self)
    }

    unsafe fn sleep(&self, _: &Spinlock) {
        unreachable!("nothing should sleep on an `OccupiedQueue`");
    }

    unsafe fn wake_one(&self, _: &Spinlock) {}

    unsafe fn wake_all(&self, _: &Spinlock) {}

    fn is_empty(&self) -> bool {
        false
    }
}

impl Platform for OutOfMemory {
    type Spin = Spinlock;
    type Queue = NoQueue;
    type Level = ();

    fn raise() -> Self::Level {}
    fn restore(_: Self::Level) {}
}

unsafe impl WaitQueue<Spinlock> for NoQueue {
    fn new(_: &str) -> Result<Self, AllocError> {
        Err(AllocError::new("wait queue"))
    }

    unsafe fn sleep(&self, _: &Spinlock) {
        unreachable!("a `NoQueue` is never constructed");
    }

    unsafe fn wake_one(&self, _: &Spinlock) {}

    unsafe fn wake_all(&self, _: &Spinlock) {}

    fn is_empty(&self) -> bool {
        true
    }
}

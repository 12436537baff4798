//! Identities of the threads calling into a primitive.
//!
//! The primitives in this crate never ask the scheduler who is running.
//! Instead, each operation that depends on the caller's identity (or on whether
//! the caller may block) takes a [`Caller`], which the kernel constructs from
//! its own notion of the current thread.
use core::{fmt, num::NonZeroUsize};

/// An opaque, comparable identifier for a kernel thread.
///
/// A `ThreadId` is just a value: a [`Lock`](crate::Lock) records the
/// `ThreadId` of its holder, but never owns or dereferences the thread it
/// names. Kernels will typically use the address of the thread control block,
/// or a sequence number handed out at spawn time.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroUsize);

/// The execution context making a call into a primitive.
///
/// This pairs the calling thread's [`ThreadId`] with whether it is currently
/// running an interrupt handler. Blocking operations refuse to run when
/// `in_interrupt` is set, since an interrupt handler has no thread of its own
/// to put to sleep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    id: ThreadId,
    in_interrupt: bool,
}

// === impl ThreadId ===

impl ThreadId {
    /// Returns a `ThreadId` for the provided raw value, or `None` if it is
    /// zero.
    ///
    /// Zero is reserved to mean "no thread".
    #[must_use]
    pub const fn new(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw value of this `ThreadId`. This is never zero.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

// === impl Caller ===

impl Caller {
    /// Returns a `Caller` for a thread running in ordinary (blockable) thread
    /// context.
    #[must_use]
    pub const fn thread(id: ThreadId) -> Self {
        Self {
            id,
            in_interrupt: false,
        }
    }

    /// Returns a `Caller` for code running in an interrupt handler that
    /// interrupted the thread `id`.
    ///
    /// An interrupt `Caller` may use the non-blocking operations, but any
    /// operation that could sleep will halt with a fatal error.
    #[must_use]
    pub const fn interrupt(id: ThreadId) -> Self {
        Self {
            id,
            in_interrupt: true,
        }
    }

    /// Returns the calling thread's identity.
    #[must_use]
    pub const fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns `true` if the caller is running an interrupt handler.
    #[must_use]
    pub const fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    /// Halts if this caller may not block.
    ///
    /// This is checked on every call to a potentially blocking operation, even
    /// when that particular call would have completed without sleeping.
    #[track_caller]
    pub(crate) fn assert_can_block(&self, op: &str, name: &str) {
        if self.in_interrupt {
            fatal!(
                "{op} on {name:?} called from interrupt context ({}); interrupt handlers may not block",
                self.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_thread() {
        assert_eq!(ThreadId::new(0), None);
        assert_eq!(ThreadId::new(7).map(ThreadId::get), Some(7));
    }

    #[test]
    fn caller_contexts() {
        let id = ThreadId::new(3).unwrap();
        assert!(!Caller::thread(id).in_interrupt());
        assert!(Caller::interrupt(id).in_interrupt());
        assert_eq!(Caller::interrupt(id).id(), id);
        assert_eq!(id.to_string(), "thread 3");
    }

    #[test]
    #[should_panic(expected = "interrupt handlers may not block")]
    fn interrupt_context_cannot_block() {
        let caller = Caller::interrupt(ThreadId::new(1).unwrap());
        caller.assert_can_block("Lock::acquire", "test");
    }
}

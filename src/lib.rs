#![doc = include_str!("../README.md")]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(docsrs, loom)))]
#![warn(missing_docs, missing_debug_implementations)]

extern crate alloc;

#[macro_use]
mod macros;

pub(crate) mod loom;

pub mod condvar;
pub mod error;
pub mod lock;
pub mod observe;
pub mod platform;
pub mod semaphore;
pub mod spin;
pub mod thread;

feature! {
    #![any(test, feature = "std")]
    pub mod hosted;
}

#[doc(inline)]
pub use self::condvar::ConditionVariable;
#[doc(inline)]
pub use self::error::AllocError;
#[doc(inline)]
pub use self::lock::{Lock, LockGuard};
#[doc(inline)]
pub use self::observe::LockObserver;
#[doc(inline)]
pub use self::platform::{AtomicRegion, Platform, RawSpinlock, WaitQueue};
#[doc(inline)]
pub use self::semaphore::Semaphore;
#[doc(inline)]
pub use self::thread::{Caller, ThreadId};

#[cfg(test)]
pub(crate) mod test_util;

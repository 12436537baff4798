#[allow(unused_imports)]
pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    #![allow(unused_imports)]
    pub(crate) use loom::{cell, hint, model, sync, thread, thread_local};
}

#[cfg(not(loom))]
mod inner {
    #![allow(dead_code, unused_imports)]

    pub(crate) use core::hint;

    pub(crate) mod sync {
        pub(crate) use core::sync::atomic;

        #[cfg(any(test, feature = "std"))]
        pub(crate) use std::sync::{Arc, Mutex, MutexGuard};
    }

    #[cfg(any(test, feature = "std"))]
    pub(crate) use std::thread_local;

    #[cfg(any(test, feature = "std"))]
    pub(crate) mod thread {
        pub(crate) use std::thread::{current, park, yield_now, JoinHandle, Thread};

        #[cfg(test)]
        pub(crate) fn spawn<F, T>(f: F) -> JoinHandle<T>
        where
            F: FnOnce() -> T,
            F: Send + 'static,
            T: Send + 'static,
        {
            let dispatch = tracing::dispatcher::get_default(|current| current.clone());
            std::thread::spawn(move || {
                let _guard = tracing::dispatcher::set_default(&dispatch);
                test_info!("thread spawned");
                f()
            })
        }
    }

    #[cfg(test)]
    pub(crate) fn model(f: impl Fn()) {
        let _trace = crate::test_util::trace_init();
        f()
    }


    pub(crate) mod cell {
        use core::cell;

        /// A [`core::cell::UnsafeCell`] with the closure-based access API of
        /// loom's checked cell, so the same code runs under both.
        #[derive(Debug)]
        pub(crate) struct UnsafeCell<T> {
            data: cell::UnsafeCell<T>,
        }

        impl<T> UnsafeCell<T> {
            pub(crate) const fn new(data: T) -> Self {
                Self {
                    data: cell::UnsafeCell::new(data),
                }
            }

            #[inline(always)]
            pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
                f(self.data.get())
            }

            #[inline(always)]
            pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
                f(self.data.get())
            }

            #[inline(always)]
            pub(crate) fn into_inner(self) -> T {
                self.data.into_inner()
            }
        }
    }
}

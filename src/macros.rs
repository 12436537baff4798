macro_rules! feature {
    (
        #![$meta:meta]
        $($item:item)*
    ) => {
        $(
            #[cfg($meta)]
            #[cfg_attr(docsrs, doc(cfg($meta)))]
            $item
        )*
    }
}

/// Reports a usage violation and halts.
///
/// Misuse of a primitive means the caller is broken, and continuing would
/// leave the primitive (and whatever it protects) in an unknown state. The
/// message is emitted as a `tracing` error before panicking, so that it reaches
/// the kernel log even if the panic handler does not print it.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        tracing::error!($($arg)+);
        panic!($($arg)+)
    }};
}

#[cfg(any(test, loom, feature = "verbose"))]
macro_rules! trace {
    ($($t:tt)*) => { tracing::trace!($($t)*) }
}

#[cfg(not(any(test, loom, feature = "verbose")))]
macro_rules! trace {
    ($($t:tt)*) => {};
}

#[cfg(not(test))]
#[cfg_attr(loom, allow(unused_macros))]
macro_rules! test_dbg {
    ($e:expr) => {
        $e
    };
}

#[cfg(test)]
#[cfg_attr(loom, allow(unused_macros))]
macro_rules! test_dbg {
    ($e:expr) => {
        match $e {
            e => {
                tracing::debug!(
                    location = %core::panic::Location::caller(),
                    "{} = {:?}",
                    stringify!($e),
                    &e
                );
                e
            }
        }
    };
}

#[cfg(test)]
macro_rules! test_info {
    ($($arg:tt)+) => {
        tracing::info!($($arg)+);
    };
}

//! Recoverable errors.
//!
//! The only recoverable failure in this crate is running out of memory while
//! creating a primitive. Everything else is a usage violation, and halts.
use alloc::string::String;

/// An error returned when a primitive (or one of the resources it owns) could
/// not be allocated.
///
/// Whatever had already been allocated when the failure occurred has been
/// released by the time this error is returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to allocate {what}")]
pub struct AllocError {
    what: &'static str,
}

impl AllocError {
    /// Returns a new `AllocError` for the resource `what`.
    ///
    /// [`WaitQueue`](crate::WaitQueue) implementations should return this when
    /// they cannot allocate their own state.
    #[must_use]
    pub const fn new(what: &'static str) -> Self {
        Self { what }
    }

    /// Returns a description of the resource that could not be allocated.
    #[must_use]
    pub const fn what(&self) -> &'static str {
        self.what
    }
}

/// Copies a diagnostic name into a freshly allocated `String`, reporting
/// allocation failure rather than aborting.
pub(crate) fn dup_name(name: &str) -> Result<String, AllocError> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| AllocError::new("name"))?;
    owned.push_str(name);
    Ok(owned)
}

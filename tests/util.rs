#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard};

pub fn trace_init() {
    use tracing_subscriber::filter::LevelFilter;
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}

/// Borrows data that the caller claims to be protecting with a
/// `ksynch::Lock`. If another thread is already using it, that claim was false.
#[track_caller]
pub fn exclusive<T>(data: &Mutex<T>) -> MutexGuard<'_, T> {
    data.try_lock()
        .expect("data protected by a ksynch::Lock was accessed concurrently")
}

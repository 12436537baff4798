use super::*;
use crate::hosted::Hosted;
use crate::loom::{
    self,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
    thread,
};
use crate::test_util::caller;

#[cfg(not(loom))]
mod sequential {
    use super::*;
    use crate::test_util::{Occupied, OutOfMemory};
    use crate::hosted;
    use crate::thread::ThreadId;

    fn lock_and_cv() -> (Lock<Hosted>, ConditionVariable<Hosted>) {
        (
            Lock::new("L").unwrap(),
            ConditionVariable::new("cv").unwrap(),
        )
    }

    #[test]
    fn signal_without_waiters() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        let me = caller(1);

        lock.acquire(&me);
        cv.signal(&lock, &me);
        cv.broadcast(&lock, &me);
        // Signalling never touches the lock.
        assert!(lock.held_by(&me));
        lock.release(&me);

        assert_eq!(hosted::preemption_level(), 0);
        assert_eq!(cv.name(), "cv");
        cv.destroy();
        lock.destroy();
    }

    #[test]
    fn wait_while_false_does_not_sleep() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        let me = caller(1);

        lock.acquire(&me);
        let mut checks = 0;
        cv.wait_while(&lock, &me, || {
            checks += 1;
            false
        });
        assert_eq!(checks, 1);
        assert!(lock.held_by(&me));
        lock.release(&me);
    }

    #[test]
    #[should_panic(expected = "ConditionVariable::wait requires thread 1 to hold lock")]
    fn wait_without_lock() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        cv.wait(&lock, &caller(1));
    }

    #[test]
    #[should_panic(expected = "ConditionVariable::wait requires thread 2 to hold lock")]
    fn wait_on_someone_elses_lock() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        lock.acquire(&caller(1));
        cv.wait(&lock, &caller(2));
    }

    #[test]
    #[should_panic(expected = "ConditionVariable::wait_while requires thread 1 to hold lock")]
    fn wait_while_without_lock() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        cv.wait_while(&lock, &caller(1), || false);
    }

    #[test]
    #[should_panic(expected = "interrupt handlers may not block")]
    fn wait_from_interrupt() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        let id = ThreadId::new(1).unwrap();
        lock.acquire(&Caller::thread(id));
        cv.wait(&lock, &Caller::interrupt(id));
    }

    #[test]
    #[should_panic(expected = "ConditionVariable::signal requires thread 1 to hold lock")]
    fn signal_without_lock() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        cv.signal(&lock, &caller(1));
    }

    #[test]
    #[should_panic(expected = "ConditionVariable::broadcast requires thread 1 to hold lock")]
    fn broadcast_without_lock() {
        let _trace = crate::test_util::trace_init();
        let (lock, cv) = lock_and_cv();
        cv.broadcast(&lock, &caller(1));
    }

    #[test]
    #[should_panic(expected = "destroyed while threads are waiting")]
    fn destroy_with_waiters() {
        let _trace = crate::test_util::trace_init();
        ConditionVariable::<Occupied>::new("cv").unwrap().destroy();
    }

    #[test]
    fn new_out_of_memory() {
        let _trace = crate::test_util::trace_init();
        let err = ConditionVariable::<OutOfMemory>::new("cv").unwrap_err();
        assert_eq!(err.what(), "wait queue");
    }
}

#[test]
fn wait_releases_lock() {
    loom::model(|| {
        let state = Arc::new((
            Lock::<Hosted>::new("L").unwrap(),
            ConditionVariable::<Hosted>::new("cv").unwrap(),
            AtomicBool::new(false),
        ));

        let waiter = thread::spawn({
            let state = state.clone();
            move || {
                let (lock, cv, ready) = &*state;
                let me = caller(1);
                lock.acquire(&me);
                cv.wait_while(lock, &me, || !ready.load(Relaxed));
                assert!(lock.held_by(&me));
                lock.release(&me);
            }
        });

        // If `wait` did not release the lock, this would never return.
        let (lock, cv, ready) = &*state;
        let me = caller(2);
        lock.acquire(&me);
        ready.store(true, Relaxed);
        cv.signal(lock, &me);
        lock.release(&me);

        waiter.join().unwrap();
        assert_eq!(lock.holder(), None);
    });
}

#[test]
fn broadcast_wakes_everyone() {
    let mut builder = loom::model::Builder::new();
    builder.preemption_bound = Some(2);
    builder.max_branches = 10_000;
    builder.check(|| {
        let state = Arc::new((
            Lock::<Hosted>::new("L").unwrap(),
            ConditionVariable::<Hosted>::new("cv").unwrap(),
            AtomicBool::new(false),
        ));

        let waiters = [1, 2].map(|id| {
            let state = state.clone();
            thread::spawn(move || {
                let (lock, cv, ready) = &*state;
                let me = caller(id);
                let _guard = lock.lock(&me);
                cv.wait_while(lock, &me, || !ready.load(Relaxed));
            })
        });

        let (lock, cv, ready) = &*state;
        let me = caller(3);
        lock.acquire(&me);
        ready.store(true, Relaxed);
        cv.broadcast(lock, &me);
        lock.release(&me);

        for waiter in waiters {
            waiter.join().unwrap();
        }
    });
}

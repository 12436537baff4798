#![cfg(all(feature = "std", not(loom)))]

use ksynch::{
    hosted::{self, Hosted},
    ConditionVariable, Lock, Semaphore,
};
use std::{
    sync::{Arc, Mutex},
    thread,
};

mod util;
use util::exclusive;

const WAITERS: usize = 8;

struct Gate {
    lock: Lock<Hosted>,
    opened: ConditionVariable<Hosted>,
    open: Mutex<bool>,
    /// Upped by each waiter just before it starts waiting.
    arrived: Semaphore<Hosted>,
}

#[test]
fn broadcast_wakes_all_waiters() {
    util::trace_init();
    let gate = Arc::new(Gate {
        lock: Lock::new("gate").unwrap(),
        opened: ConditionVariable::new("opened").unwrap(),
        open: Mutex::new(false),
        arrived: Semaphore::new("arrived", 0).unwrap(),
    });

    let waiters = (0..WAITERS)
        .map(|_| {
            let gate = gate.clone();
            thread::spawn(move || {
                let me = hosted::current();
                gate.lock.acquire(&me);
                gate.arrived.up();
                gate.opened
                    .wait_while(&gate.lock, &me, || !*exclusive(&gate.open));
                assert!(gate.lock.held_by(&me));
                gate.lock.release(&me);
            })
        })
        .collect::<Vec<_>>();

    // Each waiter arrives while holding the lock and only lets go of it inside
    // `wait`, so all of them are asleep on the condition variable by the time
    // this thread can take the lock and broadcast.
    let me = hosted::current();
    for _ in 0..WAITERS {
        gate.arrived.down(&me);
    }

    gate.lock.acquire(&me);
    *exclusive(&gate.open) = true;
    gate.opened.broadcast(&gate.lock, &me);
    gate.lock.release(&me);

    for waiter in waiters {
        waiter.join().unwrap();
    }

    let gate = Arc::into_inner(gate).unwrap();
    gate.opened.destroy();
    gate.lock.destroy();
    gate.arrived.destroy();
}

#[test]
fn signal_wakes_one_at_a_time() {
    util::trace_init();
    let gate = Arc::new(Gate {
        lock: Lock::new("gate").unwrap(),
        opened: ConditionVariable::new("opened").unwrap(),
        open: Mutex::new(false),
        arrived: Semaphore::new("arrived", 0).unwrap(),
    });
    let passed = Arc::new(Semaphore::<Hosted>::new("passed", 0).unwrap());

    let waiters = (0..WAITERS)
        .map(|_| {
            let (gate, passed) = (gate.clone(), passed.clone());
            thread::spawn(move || {
                let me = hosted::current();
                let _guard = gate.lock.lock(&me);
                gate.arrived.up();
                gate.opened.wait_while(&gate.lock, &me, || {
                    let mut open = exclusive(&gate.open);
                    // Each waiter that gets through closes the gate behind it.
                    !std::mem::replace(&mut *open, false)
                });
                passed.up();
            })
        })
        .collect::<Vec<_>>();

    let me = hosted::current();
    for _ in 0..WAITERS {
        gate.arrived.down(&me);
    }

    for _ in 0..WAITERS {
        {
            let _guard = gate.lock.lock(&me);
            *exclusive(&gate.open) = true;
            gate.opened.signal(&gate.lock, &me);
        }
        passed.down(&me);
    }

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(passed.count(), 0);
}

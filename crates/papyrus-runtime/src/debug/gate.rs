//! One-shot suspension gate.

#![allow(missing_docs)]

use parking_lot::{Condvar, Mutex};

/// Parks one VM thread until the gate is opened.
///
/// Opening is permanent: a waiter that arrives after `open` returns
/// immediately, so a release racing with the decision to suspend never
/// leaves the thread parked.
#[derive(Debug, Default)]
pub struct SuspendGate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl SuspendGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until [`SuspendGate::open`] is called.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cvar.wait(&mut open);
        }
    }

    /// Release the waiter. Idempotent.
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cvar.notify_all();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn open_releases_waiter() {
        let gate = Arc::new(SuspendGate::new());
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let waiter = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            waiter.wait();
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        gate.open();
        done_rx.recv_timeout(Duration::from_millis(500)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn wait_after_open_returns_immediately() {
        let gate = SuspendGate::new();
        gate.open();
        gate.open();
        gate.wait();
        assert!(gate.is_open());
    }
}

//! Debug adapter module map.
//! - core: main loop, dispatch, response/event encoding
//! - handlers: DAP request handlers by area
//! - protocol_io: message framing + logging
//! - tests: adapter unit tests

mod core;
mod handlers;
mod protocol_io;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde_json::Value;

use crate::session::DebugSession;

/// DAP front end for a [`DebugSession`].
pub struct DebugAdapter {
    session: DebugSession,
    next_seq: Arc<AtomicU32>,
    verbose: bool,
    protocol_log: Option<PathBuf>,
    stop_gate: StopGate,
}

#[derive(Debug, Default)]
struct DispatchOutcome {
    responses: Vec<Value>,
    events: Vec<Value>,
    should_exit: bool,
    /// Holds `stopped` events back until the responses are written.
    stop_gate: Option<StopGateToken>,
}

/// Counts run-control requests whose response is not yet on the wire.
#[derive(Debug, Clone, Default)]
struct StopGate {
    inner: Arc<StopGateInner>,
}

#[derive(Debug, Default)]
struct StopGateInner {
    count: Mutex<usize>,
    cvar: Condvar,
}

#[derive(Debug)]
struct StopGateToken {
    inner: Arc<StopGateInner>,
}

impl StopGate {
    fn enter(&self) -> StopGateToken {
        let mut count = self.inner.count.lock();
        *count = count.saturating_add(1);
        StopGateToken {
            inner: Arc::clone(&self.inner),
        }
    }

    fn wait_clear(&self) {
        let mut count = self.inner.count.lock();
        while *count > 0 {
            self.inner.cvar.wait(&mut count);
        }
    }
}

impl Drop for StopGateToken {
    fn drop(&mut self) {
        let mut count = self.inner.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.inner.cvar.notify_all();
        }
    }
}

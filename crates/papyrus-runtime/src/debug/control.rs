//! Execution control: the pause/continue/step state machine.
//!
//! VM threads call [`ExecutionControl::handle_instruction`] before every
//! instruction. A thread that has to stop records a suspension token,
//! publishes a [`DebugStop`] and parks on the token's gate outside the
//! control lock. The session thread releases it with `continue_`, `step`
//! or `close`.

#![allow(missing_docs)]

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::vm::{ExecutingThread, Opcode, StackId};

use super::breakpoints::BreakpointManager;
use super::gate::SuspendGate;
use super::{DebugStop, DebugStopReason, ExecutionState, StepKind};

/// Told when a thread parks and when it resumes, before its gate opens.
///
/// The runtime state tree issues handles only for parked threads and drops
/// them while the thread is still parked.
pub trait SuspensionObserver: Send + Sync {
    /// Called under the control lock, before the stop is published.
    fn thread_suspended(&self, stack: StackId);

    fn thread_resumed(&self, stack: StackId);
}

#[derive(Debug)]
struct SuspensionToken {
    /// Call depth at the stop; the origin for a following step.
    depth: u32,
    reason: DebugStopReason,
    gate: Arc<SuspendGate>,
}

#[derive(Debug, Default)]
struct ThreadControl {
    mode: ExecutionState,
    /// Depth the current step started from.
    step_origin: u32,
    pause_pending: bool,
    token: Option<SuspensionToken>,
}

#[derive(Default)]
struct ControlState {
    closed: bool,
    threads: FxHashMap<StackId, ThreadControl>,
    stop_tx: Option<Sender<DebugStop>>,
    observer: Option<Arc<dyn SuspensionObserver>>,
}

enum Decision {
    Proceed,
    Wait(Arc<SuspendGate>),
    CheckBreakpoint,
}

/// Shared execution control handle.
#[derive(Clone)]
pub struct ExecutionControl {
    state: Arc<Mutex<ControlState>>,
    breakpoints: Arc<BreakpointManager>,
}

impl ExecutionControl {
    #[must_use]
    pub fn new(breakpoints: Arc<BreakpointManager>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState::default())),
            breakpoints,
        }
    }

    #[must_use]
    pub fn breakpoints(&self) -> &Arc<BreakpointManager> {
        &self.breakpoints
    }

    /// Stream stop events to a sender.
    pub fn set_stop_sender(&self, sender: Sender<DebugStop>) {
        self.state.lock().stop_tx = Some(sender);
    }

    pub fn set_suspension_observer(&self, observer: Arc<dyn SuspensionObserver>) {
        self.state.lock().observer = Some(observer);
    }

    /// Track a newly created VM thread.
    pub fn thread_started(&self, stack: StackId) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.threads.entry(stack).or_default();
    }

    /// Forget a destroyed VM thread, releasing it if it was parked.
    pub fn thread_exited(&self, stack: StackId) {
        let (token, observer) = {
            let mut state = self.state.lock();
            let token = state
                .threads
                .remove(&stack)
                .and_then(|thread| thread.token);
            (token, state.observer.clone())
        };
        if let Some(token) = token {
            release(stack, token, observer.as_deref());
        }
    }

    #[must_use]
    pub fn thread_state(&self, stack: StackId) -> Option<ExecutionState> {
        self.state
            .lock()
            .threads
            .get(&stack)
            .map(|thread| thread.mode)
    }

    #[must_use]
    pub fn is_paused(&self, stack: StackId) -> bool {
        self.thread_state(stack) == Some(ExecutionState::Paused)
    }

    /// Ids of every suspended thread, ascending.
    #[must_use]
    pub fn paused_threads(&self) -> Vec<StackId> {
        let state = self.state.lock();
        let mut paused = state
            .threads
            .iter()
            .filter(|(_, thread)| thread.token.is_some())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        paused.sort_unstable();
        paused
    }

    /// Reason the thread is currently suspended for.
    #[must_use]
    pub fn stop_reason(&self, stack: StackId) -> Option<DebugStopReason> {
        self.state
            .lock()
            .threads
            .get(&stack)
            .and_then(|thread| thread.token.as_ref())
            .map(|token| token.reason)
    }

    /// Ask every running thread to stop at its next instruction.
    ///
    /// Returns `false` without touching any state when nothing is running.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let mut requested = 0_usize;
        for thread in state.threads.values_mut() {
            if thread.token.is_none() {
                thread.pause_pending = true;
                requested += 1;
            }
        }
        tracing::debug!(threads = requested, "pause requested");
        requested > 0
    }

    /// Release every suspended thread back to running.
    ///
    /// Returns `false` when no thread was suspended.
    pub fn continue_(&self) -> bool {
        let (released, observer) = {
            let mut state = self.state.lock();
            let mut released = Vec::new();
            for (id, thread) in &mut state.threads {
                thread.pause_pending = false;
                if let Some(token) = thread.token.take() {
                    thread.mode = ExecutionState::Running;
                    released.push((*id, token));
                }
            }
            (released, state.observer.clone())
        };
        tracing::debug!(threads = released.len(), "continue");
        let any = !released.is_empty();
        for (id, token) in released {
            release(id, token, observer.as_deref());
        }
        any
    }

    /// Resume one suspended thread until the step completes.
    ///
    /// Returns `false` if the thread is unknown or not suspended.
    pub fn step(&self, stack: StackId, kind: StepKind) -> bool {
        let (token, observer) = {
            let mut state = self.state.lock();
            let Some(thread) = state.threads.get_mut(&stack) else {
                return false;
            };
            let Some(token) = thread.token.take() else {
                return false;
            };
            thread.mode = kind.into();
            thread.step_origin = token.depth;
            thread.pause_pending = false;
            (token, state.observer.clone())
        };
        tracing::debug!(thread = %stack, ?kind, origin = token.depth, "step");
        release(stack, token, observer.as_deref());
        true
    }

    /// Release every parked thread and forget all state. Idempotent.
    pub fn close(&self) {
        let tokens = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.stop_tx = None;
            state.observer = None;
            state
                .threads
                .drain()
                .filter_map(|(id, thread)| thread.token.map(|token| (id, token)))
                .collect::<Vec<_>>()
        };
        tracing::debug!(released = tokens.len(), "execution control closed");
        for (id, token) in tokens {
            release(id, token, None);
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Instruction hook. Parks the calling VM thread when it has to stop.
    pub fn handle_instruction(&self, thread: &dyn ExecutingThread, opcode: Opcode) {
        let stack = thread.stack_id();
        let depth = thread.call_depth();

        let decision = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            let control = state.threads.entry(stack).or_default();
            if let Some(token) = &control.token {
                Decision::Wait(Arc::clone(&token.gate))
            } else if let Some(reason) = pending_stop(control, depth) {
                match suspend(&mut state, thread, reason) {
                    Some(gate) => Decision::Wait(gate),
                    None => Decision::Proceed,
                }
            } else {
                Decision::CheckBreakpoint
            }
        };

        let gate = match decision {
            Decision::Proceed => return,
            Decision::Wait(gate) => gate,
            Decision::CheckBreakpoint => {
                if !self.breakpoints.is_at_active_breakpoint(thread) {
                    return;
                }
                tracing::trace!(thread = %stack, opcode = opcode.0, "breakpoint hit");
                let mut state = self.state.lock();
                if state.closed {
                    return;
                }
                if let Some(token) = state.threads.get(&stack).and_then(|t| t.token.as_ref()) {
                    Arc::clone(&token.gate)
                } else {
                    match suspend(&mut state, thread, DebugStopReason::Breakpoint) {
                        Some(gate) => gate,
                        None => return,
                    }
                }
            }
        };

        gate.wait();
        tracing::trace!(thread = %stack, "resumed");
    }
}

fn suspend(
    state: &mut ControlState,
    thread: &dyn ExecutingThread,
    reason: DebugStopReason,
) -> Option<Arc<SuspendGate>> {
    let stack = thread.stack_id();
    let control = state.threads.entry(stack).or_default();
    let gate = Arc::new(SuspendGate::new());
    control.mode = ExecutionState::Paused;
    control.pause_pending = false;
    control.token = Some(SuspensionToken {
        depth: thread.call_depth(),
        reason,
        gate: Arc::clone(&gate),
    });

    let stop = DebugStop {
        reason,
        thread_id: stack,
        script: SmolStr::new(thread.script_name()),
        line: thread.current_line(),
    };
    if let Some(observer) = &state.observer {
        observer.thread_suspended(stack);
    }
    tracing::debug!(
        thread = %stack,
        reason = reason.as_str(),
        script = %stop.script,
        line = ?stop.line,
        "thread suspended"
    );
    if let Some(sender) = &state.stop_tx {
        if sender.send(stop).is_err() {
            // Nobody can resume the thread; keep it running.
            if let Some(control) = state.threads.get_mut(&stack) {
                control.token = None;
                control.mode = ExecutionState::Running;
            }
            if let Some(observer) = &state.observer {
                observer.thread_resumed(stack);
            }
            tracing::warn!(thread = %stack, "stop receiver dropped; not suspending");
            return None;
        }
    }
    Some(gate)
}

fn pending_stop(control: &ThreadControl, depth: u32) -> Option<DebugStopReason> {
    let step_done = match control.mode {
        ExecutionState::SteppingIn => true,
        ExecutionState::SteppingOver => depth <= control.step_origin,
        ExecutionState::SteppingOut => depth < control.step_origin,
        ExecutionState::Running | ExecutionState::Paused => false,
    };
    if step_done {
        Some(DebugStopReason::Step)
    } else if control.pause_pending {
        Some(DebugStopReason::Pause)
    } else {
        None
    }
}

fn release(stack: StackId, token: SuspensionToken, observer: Option<&dyn SuspensionObserver>) {
    if let Some(observer) = observer {
        observer.thread_resumed(stack);
    }
    token.gate.open();
}

impl std::fmt::Debug for ExecutionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ExecutionControl")
            .field("closed", &state.closed)
            .field("threads", &state.threads.len())
            .finish_non_exhaustive()
    }
}

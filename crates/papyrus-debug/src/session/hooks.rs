//! VM hook registration for a session.

use crossbeam_channel::Sender;

use papyrus_runtime::debug::ExecutionControl;
use papyrus_runtime::vm::{ExecutingThread, LogEvent, Opcode, StackId, VmHooks};

/// Lifecycle notifications forwarded off the VM thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum VmEvent {
    StackCreated(StackId),
    StackDestroyed(StackId),
    Log(LogEvent),
}

/// Hooks the session installs on the VM.
///
/// Only the instruction hook does work inline; everything else is queued
/// for the event pump so the raising VM thread is never blocked on I/O.
pub(super) struct SessionHooks {
    control: ExecutionControl,
    events: Sender<VmEvent>,
}

impl SessionHooks {
    pub(super) fn new(control: ExecutionControl, events: Sender<VmEvent>) -> Self {
        Self { control, events }
    }
}

impl VmHooks for SessionHooks {
    fn stack_created(&self, stack: StackId) {
        self.control.thread_started(stack);
        let _ = self.events.send(VmEvent::StackCreated(stack));
    }

    fn stack_destroyed(&self, stack: StackId) {
        let _ = self.events.send(VmEvent::StackDestroyed(stack));
    }

    fn instruction(&self, thread: &dyn ExecutingThread, opcode: Opcode) {
        self.control.handle_instruction(thread, opcode);
    }

    fn log(&self, event: &LogEvent) {
        let _ = self.events.send(VmEvent::Log(event.clone()));
    }
}

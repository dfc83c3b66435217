//! Event pump: turns stop notifications and VM lifecycle events into
//! session events on a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, unbounded, Receiver, Sender};

use papyrus_runtime::debug::{DebugStop, ExecutionControl};
use papyrus_runtime::vm::{LogEvent, Severity, StackId, VirtualMachine};

use crate::state::{RuntimeState, SourceCatalog};

use super::hooks::VmEvent;
use super::{SessionEvent, ThreadReason};

pub(super) struct PumpContext {
    pub(super) vm: Arc<dyn VirtualMachine>,
    pub(super) sources: Arc<SourceCatalog>,
    pub(super) control: ExecutionControl,
    pub(super) state: Arc<RuntimeState>,
    pub(super) closed: Arc<AtomicBool>,
    pub(super) events: Sender<SessionEvent>,
}

pub(super) struct EventPump {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl EventPump {
    pub(super) fn spawn(
        context: PumpContext,
        stops: Receiver<DebugStop>,
        vm_events: Receiver<VmEvent>,
    ) -> Self {
        let (shutdown, shutdown_rx) = unbounded::<()>();
        let handle = thread::spawn(move || loop {
            select! {
                recv(stops) -> stop => match stop {
                    Ok(stop) => context.forward_stop(stop),
                    Err(_) => break,
                },
                recv(vm_events) -> event => match event {
                    Ok(event) => context.handle_vm_event(event),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        });
        Self { shutdown, handle }
    }

    /// Stop the pump and wait for it, unless called from the pump itself.
    pub(super) fn stop(self) {
        let _ = self.shutdown.send(());
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

impl PumpContext {
    fn emit(&self, event: SessionEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.events.send(event);
    }

    fn forward_stop(&self, stop: DebugStop) {
        tracing::debug!(
            thread = %stop.thread_id,
            reason = stop.reason.as_str(),
            script = %stop.script,
            line = ?stop.line,
            "stopped"
        );
        self.emit(SessionEvent::Stopped(stop));
    }

    fn handle_vm_event(&self, event: VmEvent) {
        match event {
            VmEvent::StackCreated(stack) => self.stack_created(stack),
            VmEvent::StackDestroyed(stack) => self.stack_destroyed(stack),
            VmEvent::Log(event) => self.log(event),
        }
    }

    fn stack_created(&self, stack: StackId) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        // The stack may already be gone by the time the pump sees it.
        let Some(frames) = self.vm.stack_frames(stack) else {
            return;
        };
        self.emit(SessionEvent::Thread {
            reason: ThreadReason::Started,
            thread_id: stack,
        });

        let Some(top) = frames.first().filter(|frame| !frame.is_native) else {
            return;
        };
        if self.sources.scripts().has_source(&top.script_name) {
            return;
        }
        if let Some(source) = self.sources.source_for_script(&top.script_name) {
            tracing::debug!(script = %top.script_name, "new source loaded");
            self.emit(SessionEvent::LoadedSource(source));
        }
    }

    fn stack_destroyed(&self, stack: StackId) {
        self.control.thread_exited(stack);
        self.state.invalidate_thread(stack);
        self.emit(SessionEvent::Thread {
            reason: ThreadReason::Exited,
            thread_id: stack,
        });
    }

    fn log(&self, event: LogEvent) {
        let module = event.module.as_deref().unwrap_or("papyrus");
        match event.severity {
            Severity::Info => tracing::info!(module, "{}", event.message),
            Severity::Warning => tracing::warn!(module, "{}", event.message),
            Severity::Error | Severity::Fatal => tracing::error!(module, "{}", event.message),
        }
        let mut output = match &event.module {
            Some(module) => format!("{module} - {}", event.message),
            None => event.message,
        };
        if !output.ends_with('\n') {
            output.push('\n');
        }
        self.emit(SessionEvent::Output {
            category: "console",
            output,
        });
    }
}

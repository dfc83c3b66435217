//! Debugger session facade.
//! - DebugSession: request operations over breakpoints, control and state
//! - hooks: VM hook registration
//! - pump: off-VM-thread event translation

mod hooks;
mod pump;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use parking_lot::Mutex;

use papyrus_runtime::debug::{
    BreakpointManager, DebugStop, ExecutionControl, SourceRef, StepKind,
};
use papyrus_runtime::script::ScriptCache;
use papyrus_runtime::vm::{StackId, Subscription, VirtualMachine};
use papyrus_runtime::{DebugError, Game};

use crate::protocol::{
    AttachArguments, Breakpoint, ContinueResponseBody, LoadedSourcesResponseBody, Scope,
    ScopesResponseBody, SetBreakpointsArguments, SetBreakpointsResponseBody, Source,
    SourceArguments, SourceResponseBody, StackFrame, StackTraceArguments, StackTraceResponseBody,
    ThreadsResponseBody, Variable, VariablesArguments, VariablesResponseBody,
};
use crate::state::{source_script_name, NodeList, RuntimeState, SourceCatalog};

use self::hooks::SessionHooks;
use self::pump::{EventPump, PumpContext};

const SOURCE_MIME_TYPE: &str = "text/x-papyrus";

/// Thread lifecycle reason for `thread` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadReason {
    Started,
    Exited,
}

impl ThreadReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadReason::Started => "started",
            ThreadReason::Exited => "exited",
        }
    }
}

/// Asynchronous notification for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Stopped(DebugStop),
    Thread {
        reason: ThreadReason,
        thread_id: StackId,
    },
    LoadedSource(Source),
    Output {
        category: &'static str,
        output: String,
    },
}

#[derive(Default)]
struct Lifecycle {
    subscription: Option<Subscription>,
    pump: Option<EventPump>,
    project_path: Option<PathBuf>,
    mod_directory: Option<PathBuf>,
}

struct SessionInner {
    vm: Arc<dyn VirtualMachine>,
    scripts: Arc<dyn ScriptCache>,
    sources: Arc<SourceCatalog>,
    control: ExecutionControl,
    state: Arc<RuntimeState>,
    closed: Arc<AtomicBool>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    lifecycle: Mutex<Lifecycle>,
}

/// One debugging session against a VM.
///
/// Cheap to clone; every clone drives the same session. VM hooks are
/// installed on [`DebugSession::attach`] (or [`DebugSession::start`]) and
/// removed by [`DebugSession::end`], which also runs when the last handle
/// is dropped. An ended session cannot be restarted.
#[derive(Clone)]
pub struct DebugSession {
    inner: Arc<SessionInner>,
}

impl DebugSession {
    #[must_use]
    pub fn new(vm: Arc<dyn VirtualMachine>, scripts: Arc<dyn ScriptCache>, game: Game) -> Self {
        let sources = Arc::new(SourceCatalog::new(Arc::clone(&scripts)));
        let breakpoints = Arc::new(BreakpointManager::new(Arc::clone(&scripts), game));
        let control = ExecutionControl::new(breakpoints);
        let state = Arc::new(RuntimeState::new(Arc::clone(&vm), Arc::clone(&sources)));
        control.set_suspension_observer(state.clone());
        let (events_tx, events_rx) = unbounded();
        Self {
            inner: Arc::new(SessionInner {
                vm,
                scripts,
                sources,
                control,
                state,
                closed: Arc::new(AtomicBool::new(false)),
                events_tx,
                events_rx,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Receiver for `stopped`, `thread`, `loadedSource` and `output` events.
    #[must_use]
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.inner.events_rx.clone()
    }

    #[must_use]
    pub fn control(&self) -> &ExecutionControl {
        &self.inner.control
    }

    #[must_use]
    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.inner.state
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.lifecycle.lock().subscription.is_some()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn project_path(&self) -> Option<PathBuf> {
        self.inner.lifecycle.lock().project_path.clone()
    }

    #[must_use]
    pub fn mod_directory(&self) -> Option<PathBuf> {
        self.inner.lifecycle.lock().mod_directory.clone()
    }

    /// Record the client's project, reset the script cache unless this is a
    /// restart, and install the VM hooks.
    pub fn attach(&self, args: AttachArguments) -> Result<(), DebugError> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock();
        if self.is_ended() {
            return Err(DebugError::NotAttached);
        }
        lifecycle.project_path = args.project_path.map(PathBuf::from);
        lifecycle.mod_directory = args.mod_directory.map(PathBuf::from);
        if args.restart.is_none() {
            inner.scripts.clear();
        }
        inner.sources.set_project_sources(args.project_sources);
        inner.start_locked(&mut lifecycle)?;
        tracing::info!(
            project = ?lifecycle.project_path,
            mods = ?lifecycle.mod_directory,
            "debugger attached"
        );
        Ok(())
    }

    /// Install the VM hooks without attach arguments. No-op when started.
    pub fn start(&self) -> Result<(), DebugError> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if self.is_ended() {
            return Err(DebugError::NotAttached);
        }
        self.inner.start_locked(&mut lifecycle)
    }

    /// Release every parked thread and drop all session state. Idempotent
    /// and callable from any thread.
    pub fn end(&self) {
        self.inner.end();
    }

    pub fn set_breakpoints(
        &self,
        args: &SetBreakpointsArguments,
    ) -> Result<SetBreakpointsResponseBody, DebugError> {
        let name = source_script_name(&args.source).ok_or(DebugError::MissingSource)?;
        let reference = SourceRef::from_script_name(&name);

        if let Some(project) = self.inner.sources.project_source(reference) {
            if let (Some(loaded), Some(requested)) =
                (project.modified_time, args.source.modified_time)
            {
                if requested > loaded {
                    return Err(DebugError::StaleSource(name));
                }
            }
        }

        let lines = requested_lines(args);
        let verified = self
            .inner
            .control
            .breakpoints()
            .set_breakpoints(&name, &lines)?;
        let source = Source {
            source_reference: Some(reference.get()),
            ..args.source.clone()
        };
        let breakpoints = verified
            .into_iter()
            .map(|bp| Breakpoint::at_line(bp.line, bp.verified, Some(source.clone())))
            .collect();
        Ok(SetBreakpointsResponseBody { breakpoints })
    }

    /// Stop every running thread at its next instruction.
    pub fn pause(&self, thread_id: u32) -> Result<(), DebugError> {
        if !self.is_attached() {
            return Err(DebugError::NotAttached);
        }
        if self.inner.control.pause() {
            Ok(())
        } else {
            Err(DebugError::UnknownThread(StackId(thread_id)))
        }
    }

    /// Resume every paused thread.
    pub fn continue_(&self, thread_id: u32) -> Result<ContinueResponseBody, DebugError> {
        if self.inner.control.continue_() {
            Ok(ContinueResponseBody {
                all_threads_continued: Some(true),
            })
        } else {
            Err(DebugError::ThreadNotPaused(StackId(thread_id)))
        }
    }

    pub fn step(&self, thread_id: u32, kind: StepKind) -> Result<(), DebugError> {
        let stack = StackId(thread_id);
        if self.inner.control.thread_state(stack).is_none() {
            return Err(DebugError::UnknownThread(stack));
        }
        if self.inner.control.step(stack, kind) {
            Ok(())
        } else {
            Err(DebugError::ThreadNotPaused(stack))
        }
    }

    pub fn threads(&self) -> Result<ThreadsResponseBody, DebugError> {
        let nodes = self
            .inner
            .state
            .resolve_children_by_parent_path("")
            .unwrap_or_default();
        let threads = collect_views(&nodes, |node| {
            node.as_thread().map(|view| view.to_thread())
        })?;
        Ok(ThreadsResponseBody { threads })
    }

    pub fn stack_trace(
        &self,
        args: &StackTraceArguments,
    ) -> Result<StackTraceResponseBody, DebugError> {
        let stack = StackId(args.thread_id);
        let nodes = self
            .inner
            .state
            .resolve_children_by_parent_path(&stack.to_string())
            .ok_or(DebugError::UnknownThread(stack))?;
        let frames: Vec<StackFrame> = collect_views(&nodes, |node| {
            node.as_stack_frame().map(|view| view.to_stack_frame())
        })?;
        let total_frames = u32::try_from(frames.len()).unwrap_or(u32::MAX);
        let stack_frames = page(frames, args.start_frame, args.levels);
        Ok(StackTraceResponseBody {
            stack_frames,
            total_frames: Some(total_frames),
        })
    }

    pub fn scopes(&self, frame_id: u32) -> Result<ScopesResponseBody, DebugError> {
        let nodes = self.inner.state.resolve_children_by_parent_id(frame_id)?;
        let scopes: Vec<Scope> =
            collect_views(&nodes, |node| node.as_scope().map(|view| view.to_scope()))?;
        Ok(ScopesResponseBody { scopes })
    }

    pub fn variables(&self, args: &VariablesArguments) -> Result<VariablesResponseBody, DebugError> {
        let nodes = self
            .inner
            .state
            .resolve_children_by_parent_id(args.variables_reference)?;
        let variables: Vec<Variable> = collect_views(&nodes, |node| {
            node.as_variable().map(|view| view.to_variable())
        })?;
        Ok(VariablesResponseBody {
            variables: page(variables, args.start, args.count),
        })
    }

    /// Decompiled text for a source named directly or by reference.
    pub fn source(&self, args: &SourceArguments) -> Result<SourceResponseBody, DebugError> {
        let name = match args.source.as_ref().and_then(source_script_name) {
            Some(name) => name,
            None => {
                let reference = args
                    .source
                    .as_ref()
                    .and_then(|source| source.source_reference)
                    .filter(|reference| *reference != 0)
                    .unwrap_or(args.source_reference);
                if reference == 0 {
                    return Err(DebugError::MissingSource);
                }
                self.inner
                    .sources
                    .script_for_reference(reference, &self.inner.vm.loaded_scripts())
                    .ok_or_else(|| DebugError::SourceUnavailable(reference.to_string().into()))?
            }
        };
        let content = self
            .inner
            .scripts
            .decompiled_source(&name)
            .ok_or(DebugError::SourceUnavailable(name))?;
        Ok(SourceResponseBody {
            content,
            mime_type: Some(SOURCE_MIME_TYPE.to_string()),
        })
    }

    /// Every script the VM has loaded, with project sources taking
    /// precedence over cache metadata.
    #[must_use]
    pub fn loaded_sources(&self) -> LoadedSourcesResponseBody {
        let mut sources = IndexMap::new();
        for script in self.inner.vm.loaded_scripts() {
            let reference = SourceRef::from_script_name(&script);
            if sources.contains_key(&reference) {
                continue;
            }
            if let Some(source) = self.inner.sources.source_for_script(&script) {
                sources.insert(reference, source);
            }
        }
        LoadedSourcesResponseBody {
            sources: sources.into_values().collect(),
        }
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("attached", &self.is_attached())
            .field("ended", &self.is_ended())
            .field("control", &self.inner.control)
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    fn start_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), DebugError> {
        if lifecycle.subscription.is_some() {
            return Ok(());
        }
        let (stop_tx, stop_rx) = unbounded();
        let (vm_tx, vm_rx) = unbounded();
        self.control.set_stop_sender(stop_tx);
        let hooks = Arc::new(SessionHooks::new(self.control.clone(), vm_tx));
        let subscription = Subscription::acquire(Arc::clone(&self.vm), hooks).map_err(|err| {
            tracing::error!(%err, "failed to subscribe to VM events");
            err
        })?;

        let running = self.vm.running_stacks();
        for stack in &running {
            self.control.thread_started(*stack);
        }
        let pump = EventPump::spawn(
            PumpContext {
                vm: Arc::clone(&self.vm),
                sources: Arc::clone(&self.sources),
                control: self.control.clone(),
                state: Arc::clone(&self.state),
                closed: Arc::clone(&self.closed),
                events: self.events_tx.clone(),
            },
            stop_rx,
            vm_rx,
        );
        lifecycle.subscription = Some(subscription);
        lifecycle.pump = Some(pump);
        tracing::debug!(threads = running.len(), "session started");
        Ok(())
    }

    fn end(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (subscription, pump) = {
            let mut lifecycle = self.lifecycle.lock();
            (lifecycle.subscription.take(), lifecycle.pump.take())
        };
        drop(subscription);
        self.control.close();
        self.control.breakpoints().clear_breakpoints();
        self.state.clear();
        self.sources.clear();
        if let Some(pump) = pump {
            pump.stop();
        }
        tracing::info!("debug session ended");
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.end();
    }
}

fn requested_lines(args: &SetBreakpointsArguments) -> Vec<u32> {
    match (&args.breakpoints, &args.lines) {
        (Some(breakpoints), _) => breakpoints.iter().map(|bp| bp.line).collect(),
        (None, Some(lines)) => lines.clone(),
        (None, None) => Vec::new(),
    }
}

/// Serialize every node that has the wanted capability; others are skipped.
fn collect_views<T>(
    nodes: &NodeList,
    view: impl Fn(&dyn crate::state::StateNode) -> Option<Result<T, DebugError>>,
) -> Result<Vec<T>, DebugError> {
    nodes
        .iter()
        .filter_map(|node| view(node.as_ref()))
        .collect()
}

fn page<T>(items: Vec<T>, start: Option<u32>, count: Option<u32>) -> Vec<T> {
    let start = start
        .and_then(|start| usize::try_from(start).ok())
        .unwrap_or(0);
    let count = count
        .and_then(|count| usize::try_from(count).ok())
        .filter(|count| *count > 0)
        .unwrap_or(usize::MAX);
    items.into_iter().skip(start).take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SourceBreakpoint;
    use papyrus_runtime::debug::DebugStopReason;
    use papyrus_runtime::harness::{frame, MemoryScriptCache, TestVm};
    use papyrus_runtime::vm::Severity;
    use std::thread;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct Fixture {
        vm: Arc<TestVm>,
        scripts: Arc<MemoryScriptCache>,
        session: DebugSession,
        events: Receiver<SessionEvent>,
    }

    fn fixture() -> Fixture {
        let vm = Arc::new(TestVm::new());
        let scripts = Arc::new(MemoryScriptCache::new());
        scripts.insert_lines("Quest", &[10, 11, 12]);
        scripts.set_source("Quest", "Scriptname Quest extends Quest\n");
        let session = DebugSession::new(vm.clone(), scripts.clone(), Game::Skyrim);
        let events = session.events();
        Fixture {
            vm,
            scripts,
            session,
            events,
        }
    }

    fn breakpoint_args(name: &str, lines: &[u32], modified_time: Option<i64>) -> SetBreakpointsArguments {
        SetBreakpointsArguments {
            source: Source {
                name: Some(name.to_string()),
                modified_time,
                ..Source::default()
            },
            breakpoints: Some(
                lines
                    .iter()
                    .map(|line| SourceBreakpoint {
                        line: *line,
                        column: None,
                        condition: None,
                    })
                    .collect(),
            ),
            lines: None,
            source_modified: None,
        }
    }

    fn next_stop(events: &Receiver<SessionEvent>) -> DebugStop {
        loop {
            match events.recv_timeout(TIMEOUT).expect("stopped event") {
                SessionEvent::Stopped(stop) => return stop,
                _ => continue,
            }
        }
    }

    #[test]
    fn attach_clears_cache_unless_restarting() {
        let fixture = fixture();
        fixture.session.attach(AttachArguments::default()).unwrap();
        assert_eq!(fixture.scripts.clear_count(), 1);
        fixture
            .session
            .attach(AttachArguments {
                restart: Some(serde_json::Value::Bool(false)),
                ..AttachArguments::default()
            })
            .unwrap();
        assert_eq!(fixture.scripts.clear_count(), 1);
        assert!(fixture.session.is_attached());
        assert_eq!(fixture.vm.hook_count(), 1);
    }

    #[test]
    fn attach_fails_when_vm_is_unreachable() {
        let fixture = fixture();
        fixture.vm.set_available(false);
        assert_eq!(
            fixture.session.attach(AttachArguments::default()).unwrap_err(),
            DebugError::VmUnavailable
        );
        assert!(!fixture.session.is_attached());
    }

    #[test]
    fn stale_project_source_is_rejected() {
        let fixture = fixture();
        fixture
            .session
            .attach(AttachArguments {
                project_sources: vec![Source {
                    name: Some("Quest.psc".into()),
                    modified_time: Some(1_000),
                    ..Source::default()
                }],
                ..AttachArguments::default()
            })
            .unwrap();

        let err = fixture
            .session
            .set_breakpoints(&breakpoint_args("Quest.psc", &[12], Some(2_000)))
            .unwrap_err();
        assert_eq!(err, DebugError::StaleSource("quest".into()));

        let body = fixture
            .session
            .set_breakpoints(&breakpoint_args("Quest.psc", &[12], Some(1_000)))
            .unwrap();
        assert!(body.breakpoints[0].verified);
    }

    #[test]
    fn missing_source_name_is_an_error() {
        let fixture = fixture();
        let mut args = breakpoint_args("x", &[1], None);
        args.source = Source::default();
        assert_eq!(
            fixture.session.set_breakpoints(&args).unwrap_err(),
            DebugError::MissingSource
        );
    }

    #[test]
    fn pause_and_continue_report_soft_failures() {
        let fixture = fixture();
        assert_eq!(fixture.session.pause(1).unwrap_err(), DebugError::NotAttached);
        fixture.session.attach(AttachArguments::default()).unwrap();
        assert_eq!(
            fixture.session.pause(1).unwrap_err(),
            DebugError::UnknownThread(StackId(1))
        );
        assert_eq!(
            fixture.session.continue_(1).unwrap_err(),
            DebugError::ThreadNotPaused(StackId(1))
        );
        assert_eq!(
            fixture.session.step(7, StepKind::Over).unwrap_err(),
            DebugError::UnknownThread(StackId(7))
        );
    }

    #[test]
    fn pause_stops_a_running_thread() {
        let fixture = fixture();
        fixture.session.attach(AttachArguments::default()).unwrap();
        let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 10)]);
        assert_eq!(
            fixture.session.step(stack.0, StepKind::Into).unwrap_err(),
            DebugError::ThreadNotPaused(stack)
        );
        fixture.session.pause(stack.0).unwrap();

        let vm = fixture.vm.clone();
        let worker = thread::spawn(move || vm.execute(stack));
        let stop = next_stop(&fixture.events);
        assert_eq!(stop.reason, DebugStopReason::Pause);
        assert_eq!(stop.thread_id, stack);
        fixture.session.continue_(stack.0).unwrap();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn thread_and_log_events_are_forwarded() {
        let fixture = fixture();
        fixture.vm.add_loaded_script("Quest");
        fixture.session.attach(AttachArguments::default()).unwrap();
        let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 10)]);

        let started = fixture.events.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(
            started,
            SessionEvent::Thread {
                reason: ThreadReason::Started,
                thread_id: stack
            }
        );
        match fixture.events.recv_timeout(TIMEOUT).unwrap() {
            SessionEvent::LoadedSource(source) => {
                assert_eq!(source.name.as_deref(), Some("Quest.psc"));
            }
            other => panic!("expected loadedSource, got {other:?}"),
        }

        fixture.vm.log(Severity::Warning, "property not set");
        assert_eq!(
            fixture.events.recv_timeout(TIMEOUT).unwrap(),
            SessionEvent::Output {
                category: "console",
                output: "property not set\n".to_string()
            }
        );

        fixture.vm.log_from("Quest.esp", Severity::Info, "stage set");
        assert_eq!(
            fixture.events.recv_timeout(TIMEOUT).unwrap(),
            SessionEvent::Output {
                category: "console",
                output: "Quest.esp - stage set\n".to_string()
            }
        );

        fixture.vm.destroy_stack(stack);
        assert_eq!(
            fixture.events.recv_timeout(TIMEOUT).unwrap(),
            SessionEvent::Thread {
                reason: ThreadReason::Exited,
                thread_id: stack
            }
        );
        assert_eq!(fixture.session.control().thread_state(stack), None);
    }

    #[test]
    fn source_lookup_by_name_and_reference() {
        let fixture = fixture();
        fixture.vm.add_loaded_script("Quest");
        let by_name = fixture
            .session
            .source(&SourceArguments {
                source: Some(Source {
                    name: Some("Quest.psc".into()),
                    ..Source::default()
                }),
                source_reference: 0,
            })
            .unwrap();
        assert!(by_name.content.starts_with("Scriptname Quest"));

        let reference = SourceRef::from_script_name("Quest").get();
        let by_reference = fixture
            .session
            .source(&SourceArguments {
                source: None,
                source_reference: reference,
            })
            .unwrap();
        assert_eq!(by_reference.content, by_name.content);

        assert_eq!(
            fixture
                .session
                .source(&SourceArguments {
                    source: None,
                    source_reference: 0
                })
                .unwrap_err(),
            DebugError::MissingSource
        );
        assert!(matches!(
            fixture.session.source(&SourceArguments {
                source: None,
                source_reference: 12_345,
            }),
            Err(DebugError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn loaded_sources_prefer_project_sources() {
        let fixture = fixture();
        fixture.scripts.insert_lines("Actor", &[1]);
        fixture.vm.add_loaded_script("Quest");
        fixture.vm.add_loaded_script("Actor");
        fixture
            .session
            .attach(AttachArguments {
                project_sources: vec![Source {
                    name: Some("Quest.psc".into()),
                    path: Some("C:/project/Quest.psc".into()),
                    ..Source::default()
                }],
                ..AttachArguments::default()
            })
            .unwrap();
        let body = fixture.session.loaded_sources();
        assert_eq!(body.sources.len(), 2);
        assert_eq!(body.sources[0].path.as_deref(), Some("C:/project/Quest.psc"));
        assert_eq!(body.sources[1].name.as_deref(), Some("Actor.psc"));
    }

    /// Stop `stack` at the breakpoint on line 12 and return the worker and
    /// the handle of its top frame.
    fn stop_at_line_12(fixture: &Fixture) -> (StackId, thread::JoinHandle<bool>, u32) {
        fixture
            .session
            .set_breakpoints(&breakpoint_args("Quest", &[12], None))
            .unwrap();
        let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 12)]);
        let vm = fixture.vm.clone();
        let worker = thread::spawn(move || vm.execute(stack));
        assert_eq!(next_stop(&fixture.events).reason, DebugStopReason::Breakpoint);

        let trace = fixture
            .session
            .stack_trace(&StackTraceArguments {
                thread_id: stack.0,
                start_frame: None,
                levels: None,
            })
            .unwrap();
        let frame_id = trace.stack_frames[0].id;
        assert_ne!(frame_id, 0);
        assert_eq!(fixture.session.scopes(frame_id).unwrap().scopes.len(), 1);
        (stack, worker, frame_id)
    }

    #[test]
    fn running_thread_frames_cannot_be_expanded() {
        let fixture = fixture();
        fixture.session.attach(AttachArguments::default()).unwrap();
        let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 10)]);

        let trace = fixture
            .session
            .stack_trace(&StackTraceArguments {
                thread_id: stack.0,
                start_frame: None,
                levels: None,
            })
            .unwrap();
        assert_eq!(trace.stack_frames.len(), 1);
        assert_eq!(trace.stack_frames[0].name, "Quest.OnInit");
        assert_eq!(trace.stack_frames[0].id, 0);

        fixture.vm.push_frame(stack, frame("Utility", "Wait", 3));
        assert_eq!(
            fixture.session.scopes(0).unwrap_err(),
            DebugError::UnknownHandle(0)
        );
        assert_eq!(fixture.session.state().live_handles(), 0);
    }

    #[test]
    fn step_invalidates_frame_handles() {
        let fixture = fixture();
        fixture.session.attach(AttachArguments::default()).unwrap();
        let (stack, worker, frame_id) = stop_at_line_12(&fixture);

        fixture.session.step(stack.0, StepKind::Over).unwrap();
        assert!(worker.join().unwrap());
        assert_eq!(
            fixture.session.scopes(frame_id).unwrap_err(),
            DebugError::UnknownHandle(frame_id)
        );
        assert_eq!(fixture.session.state().live_handles(), 0);
    }

    #[test]
    fn end_is_idempotent_and_final() {
        let fixture = fixture();
        fixture.session.attach(AttachArguments::default()).unwrap();
        let (stack, worker, frame_id) = stop_at_line_12(&fixture);
        assert!(fixture.session.state().live_handles() > 0);

        fixture.session.end();
        fixture.session.end();
        assert!(worker.join().unwrap());
        assert!(fixture.session.is_ended());
        assert_eq!(fixture.vm.hook_count(), 0);
        assert!(fixture.session.control().breakpoints().is_empty());
        assert_eq!(fixture.session.state().live_handles(), 0);
        assert!(!fixture.session.state().is_suspended(stack));
        assert_eq!(
            fixture.session.scopes(frame_id).unwrap_err(),
            DebugError::UnknownHandle(frame_id)
        );
        assert_eq!(
            fixture.session.attach(AttachArguments::default()).unwrap_err(),
            DebugError::NotAttached
        );
    }

    #[test]
    fn paging_skips_and_limits() {
        assert_eq!(page(vec![1, 2, 3, 4], Some(1), Some(2)), vec![2, 3]);
        assert_eq!(page(vec![1, 2, 3], None, Some(0)), vec![1, 2, 3]);
        assert_eq!(page(vec![1, 2], Some(5), None), Vec::<i32>::new());
    }
}

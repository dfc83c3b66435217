//! Adapter unit tests.
//! - stdio framing roundtrips
//! - request dispatch against the in-memory VM
//! - full protocol loop over in-memory streams

use super::core::session_event;
use super::protocol_io::{read_message, write_message};
use super::*;
use crate::protocol::{
    AttachArguments, ContinueArguments, InitializeResponseBody, MessageType, NextArguments,
    PauseArguments,
    Request, Response, ScopesArguments, ScopesResponseBody, SetBreakpointsArguments,
    SetBreakpointsResponseBody, SetFunctionBreakpointsArguments, FunctionBreakpoint, Source,
    SourceBreakpoint, StackTraceArguments, StackTraceResponseBody, StepInArguments,
    ThreadsResponseBody, VariablesArguments, VariablesResponseBody,
};
use crate::session::{DebugSession, SessionEvent};
use expect_test::expect;
use papyrus_runtime::debug::DebugStop;
use papyrus_runtime::harness::{frame, MemoryScriptCache, TestVm};
use papyrus_runtime::vm::{ObjectId, StackId, VmValue, VmVariable};
use papyrus_runtime::Game;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{BufReader, Write};
use std::sync::atomic::AtomicU32;
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    vm: Arc<TestVm>,
    adapter: DebugAdapter,
}

fn fixture() -> Fixture {
    let vm = Arc::new(TestVm::new());
    let scripts = Arc::new(MemoryScriptCache::new());
    scripts.insert_lines("Quest", &[10, 11, 12]);
    scripts.insert_script("Stripped", Vec::new());
    let session = DebugSession::new(vm.clone(), scripts, Game::Skyrim);
    Fixture {
        vm,
        adapter: DebugAdapter::new(session),
    }
}

fn request<T: Serialize>(seq: u32, command: &str, args: Option<T>) -> Request<Value> {
    Request {
        seq,
        message_type: MessageType::Request,
        command: command.to_string(),
        arguments: args.map(|args| serde_json::to_value(args).unwrap()),
    }
}

fn response<T: serde::de::DeserializeOwned>(outcome: &DispatchOutcome) -> Response<T> {
    serde_json::from_value(outcome.responses[0].clone()).unwrap()
}

fn error_message(outcome: &DispatchOutcome) -> String {
    let response: Response<Value> = response(outcome);
    assert!(!response.success);
    response.message.unwrap()
}

fn attach(adapter: &mut DebugAdapter) {
    let outcome = adapter.dispatch_request(request(1, "attach", Some(AttachArguments::default())));
    let response: Response<Value> = response(&outcome);
    assert!(response.success, "{:?}", response.message);
}

fn set_breakpoints(adapter: &mut DebugAdapter, name: &str, lines: &[u32]) -> DispatchOutcome {
    let args = SetBreakpointsArguments {
        source: Source {
            name: Some(name.to_string()),
            path: Some(format!("C:/Mods/Scripts/Source/{name}")),
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
    };
    adapter.dispatch_request(request(2, "setBreakpoints", Some(args)))
}

fn wait_for_stop(session: &DebugSession) -> DebugStop {
    let events = session.events();
    loop {
        if let SessionEvent::Stopped(stop) = events.recv_timeout(TIMEOUT).expect("stopped event") {
            return stop;
        }
    }
}

#[test]
fn stdio_roundtrip() {
    let payload = r#"{"seq":1,"type":"request","command":"initialize"}"#;
    let mut buffer = Vec::new();
    write_message(&mut buffer, payload).unwrap();

    let mut reader = BufReader::new(&buffer[..]);
    let read = read_message(&mut reader).unwrap().unwrap();
    assert_eq!(read, payload);
    assert!(read_message(&mut reader).unwrap().is_none());
}

#[test]
fn initialize_advertises_capabilities_then_initialized() {
    let mut fixture = fixture();
    let outcome = fixture
        .adapter
        .dispatch_request(request::<Value>(1, "initialize", None));
    let response: Response<InitializeResponseBody> = response(&outcome);
    let capabilities = response.body.unwrap().capabilities;
    assert_eq!(capabilities.supports_configuration_done_request, Some(true));
    assert_eq!(capabilities.supports_loaded_sources_request, Some(true));
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0]["event"], "initialized");
}

#[test]
fn unsupported_command_is_rejected() {
    let mut fixture = fixture();
    let outcome = fixture
        .adapter
        .dispatch_request(request::<Value>(9, "evaluate", None));
    assert_eq!(error_message(&outcome), "unsupported command");
}

#[test]
fn malformed_arguments_are_rejected() {
    let mut fixture = fixture();
    let outcome = fixture
        .adapter
        .dispatch_request(request(3, "stackTrace", Some(serde_json::json!({"levels": 1}))));
    assert_eq!(error_message(&outcome), "invalid stackTrace args");
}

#[test]
fn set_breakpoints_echoes_source_and_verification() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    let outcome = set_breakpoints(&mut fixture.adapter, "Quest.psc", &[12, 40]);
    let response: Response<SetBreakpointsResponseBody> = response(&outcome);
    assert!(response.success);
    let breakpoints = response.body.unwrap().breakpoints;
    assert_eq!(breakpoints.len(), 2);
    assert!(breakpoints[0].verified);
    assert_eq!(breakpoints[0].line, Some(12));
    assert!(!breakpoints[1].verified);
    let source = breakpoints[0].source.clone().unwrap();
    assert_eq!(source.path.as_deref(), Some("C:/Mods/Scripts/Source/Quest.psc"));
    assert!(source.source_reference.is_some_and(|reference| reference > 0));
}

#[test]
fn set_breakpoints_reports_cache_failures() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);

    let outcome = set_breakpoints(&mut fixture.adapter, "Missing.psc", &[1]);
    assert_eq!(
        error_message(&outcome),
        "Could not find PEX data for script missing"
    );

    let outcome = set_breakpoints(&mut fixture.adapter, "Stripped.psc", &[1]);
    expect![[r#"No debug data for script stripped. Ensure that `bLoadDebugInformation=1` is set under `[Papyrus]` in skyrim.ini"#]]
        .assert_eq(&error_message(&outcome));
}

#[test]
fn function_breakpoints_are_unverified() {
    let mut fixture = fixture();
    let args = SetFunctionBreakpointsArguments {
        breakpoints: vec![
            FunctionBreakpoint {
                name: "Quest.OnInit".into(),
            },
            FunctionBreakpoint {
                name: "Actor.OnDeath".into(),
            },
        ],
    };
    let outcome = fixture
        .adapter
        .dispatch_request(request(4, "setFunctionBreakpoints", Some(args)));
    let response: Response<SetBreakpointsResponseBody> = response(&outcome);
    let breakpoints = response.body.unwrap().breakpoints;
    assert_eq!(breakpoints.len(), 2);
    assert!(breakpoints.iter().all(|bp| !bp.verified
        && bp.message.as_deref() == Some("function breakpoints are not supported")));
}

#[test]
fn pause_and_continue_without_targets_fail() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    let outcome = fixture
        .adapter
        .dispatch_request(request(5, "pause", Some(PauseArguments { thread_id: 3 })));
    assert_eq!(error_message(&outcome), "Could not find thread 3");

    let outcome = fixture
        .adapter
        .dispatch_request(request(6, "continue", Some(ContinueArguments { thread_id: 3 })));
    assert_eq!(error_message(&outcome), "Thread 3 is not paused");
}

#[test]
fn breakpoint_stop_exposes_state_until_resume() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    set_breakpoints(&mut fixture.adapter, "Quest.psc", &[12]);

    fixture.vm.add_object(
        ObjectId(7),
        vec![VmVariable::new("Stage", VmValue::Int(20))],
    );
    let mut top = frame("Quest", "OnInit", 12);
    top.locals = vec![
        VmVariable::new("count", VmValue::Int(3)),
        VmVariable::new("speaker", VmValue::String("Lydia".into())),
        VmVariable::new(
            "weights",
            VmValue::Array {
                element_type: "Float".into(),
                elements: vec![VmValue::Float(1.5), VmValue::Float(2.0)],
            },
        ),
        VmVariable::new("target", VmValue::None),
    ];
    top.self_object = Some(VmValue::Object {
        type_name: "Quest".into(),
        id: ObjectId(7),
    });
    let stack = fixture.vm.spawn_stack(vec![top]);

    let vm = fixture.vm.clone();
    let worker = thread::spawn(move || vm.execute(stack));
    let stop = wait_for_stop(fixture.adapter.session());
    assert_eq!(stop.thread_id, stack);
    assert_eq!(stop.line, Some(12));

    let outcome = fixture
        .adapter
        .dispatch_request(request::<Value>(10, "threads", None));
    let threads = response::<ThreadsResponseBody>(&outcome).body.unwrap().threads;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].name, format!("{} (Quest.OnInit)", stack));

    let outcome = fixture.adapter.dispatch_request(request(
        11,
        "stackTrace",
        Some(StackTraceArguments {
            thread_id: stack.0,
            start_frame: None,
            levels: None,
        }),
    ));
    let trace = response::<StackTraceResponseBody>(&outcome).body.unwrap();
    assert_eq!(trace.total_frames, Some(1));
    let top = &trace.stack_frames[0];
    assert_eq!(top.name, "Quest.OnInit");
    assert_eq!(top.line, 12);

    let outcome = fixture
        .adapter
        .dispatch_request(request(12, "scopes", Some(ScopesArguments { frame_id: top.id })));
    let scopes = response::<ScopesResponseBody>(&outcome).body.unwrap().scopes;
    let names: Vec<_> = scopes.iter().map(|scope| scope.name.as_str()).collect();
    assert_eq!(names, ["Local", "Self"]);

    let local = scopes[0].variables_reference;
    let outcome = fixture.adapter.dispatch_request(request(
        13,
        "variables",
        Some(VariablesArguments {
            variables_reference: local,
            start: None,
            count: None,
        }),
    ));
    let variables = response::<VariablesResponseBody>(&outcome)
        .body
        .unwrap()
        .variables;
    let rendered = variables
        .iter()
        .map(|variable| {
            format!(
                "{} = {} : {} expandable={}",
                variable.name,
                variable.value,
                variable.r#type.as_deref().unwrap_or("-"),
                variable.variables_reference != 0
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    expect![[r#"
        count = 3 : Int expandable=false
        speaker = "Lydia" : String expandable=false
        weights = Float[2] : Float[] expandable=true
        target = None : - expandable=false"#]]
    .assert_eq(&rendered);

    let outcome = fixture
        .adapter
        .dispatch_request(request(14, "continue", Some(ContinueArguments { thread_id: stack.0 })));
    let response_value: Response<Value> = response(&outcome);
    assert!(response_value.success);
    assert!(worker.join().unwrap());

    let outcome = fixture.adapter.dispatch_request(request(
        15,
        "variables",
        Some(VariablesArguments {
            variables_reference: local,
            start: None,
            count: None,
        }),
    ));
    assert_eq!(
        error_message(&outcome),
        format!("No such variable reference {local}")
    );
}

#[test]
fn step_in_requires_a_paused_thread() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 10)]);
    let outcome = fixture
        .adapter
        .dispatch_request(request(7, "stepIn", Some(StepInArguments { thread_id: stack.0 })));
    assert_eq!(
        error_message(&outcome),
        format!("Thread {} is not paused", stack)
    );
}

#[test]
fn disconnect_releases_every_paused_thread() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    set_breakpoints(&mut fixture.adapter, "Quest.psc", &[11]);

    let stacks: Vec<StackId> = (0..3)
        .map(|_| fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 11)]))
        .collect();
    let workers: Vec<_> = stacks
        .iter()
        .map(|stack| {
            let vm = fixture.vm.clone();
            let stack = *stack;
            thread::spawn(move || vm.execute(stack))
        })
        .collect();
    for _ in &stacks {
        wait_for_stop(fixture.adapter.session());
    }

    let outcome = fixture
        .adapter
        .dispatch_request(request::<Value>(20, "disconnect", None));
    assert!(outcome.should_exit);
    assert_eq!(outcome.events[0]["event"], "terminated");
    for worker in workers {
        assert!(worker.join().unwrap());
    }
    assert!(fixture.adapter.session().is_ended());
    assert_eq!(fixture.vm.hook_count(), 0);
}

#[test]
fn stop_gate_waits_for_every_token() {
    let gate = StopGate::default();
    let first = gate.enter();
    let second = gate.enter();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let waiter = {
        let gate = gate.clone();
        thread::spawn(move || {
            gate.wait_clear();
            tx.send(()).unwrap();
        })
    };

    drop(first);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    drop(second);
    rx.recv_timeout(TIMEOUT).unwrap();
    waiter.join().unwrap();
}

#[test]
fn step_stop_is_held_until_the_response_is_released() {
    let mut fixture = fixture();
    attach(&mut fixture.adapter);
    set_breakpoints(&mut fixture.adapter, "Quest.psc", &[12]);
    let stack = fixture.vm.spawn_stack(vec![frame("Quest", "OnInit", 12)]);
    let vm = fixture.vm.clone();
    let worker = thread::spawn(move || vm.execute(stack) && vm.execute(stack));
    wait_for_stop(fixture.adapter.session());

    let outcome = fixture
        .adapter
        .dispatch_request(request(30, "next", Some(NextArguments { thread_id: stack.0 })));
    let response_value: Response<Value> = response(&outcome);
    assert!(response_value.success);
    assert!(outcome.stop_gate.is_some());

    let stop = wait_for_stop(fixture.adapter.session());
    assert_eq!(stop.reason, papyrus_runtime::debug::DebugStopReason::Step);
    let (tx, rx) = crossbeam_channel::bounded(1);
    let writer = {
        let gate = fixture.adapter.stop_gate.clone();
        thread::spawn(move || {
            gate.wait_clear();
            tx.send(()).unwrap();
        })
    };
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    drop(outcome);
    rx.recv_timeout(TIMEOUT).unwrap();
    writer.join().unwrap();

    let outcome = fixture
        .adapter
        .dispatch_request(request(31, "continue", Some(ContinueArguments { thread_id: stack.0 })));
    assert!(outcome.stop_gate.is_some());
    drop(outcome);
    assert!(worker.join().unwrap());
}

#[test]
fn session_events_encode_as_protocol_events() {
    let seq = AtomicU32::new(40);
    let event = session_event(
        &seq,
        SessionEvent::Stopped(DebugStop {
            reason: papyrus_runtime::debug::DebugStopReason::Step,
            thread_id: StackId(5),
            script: "quest".into(),
            line: Some(11),
        }),
    );
    expect![[r#"{"body":{"allThreadsStopped":false,"reason":"step","threadId":5},"event":"stopped","seq":40,"type":"event"}"#]]
        .assert_eq(&event.to_string());
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn run_loop_answers_until_disconnect() {
    let mut input = Vec::new();
    for payload in [
        r#"{"seq":1,"type":"request","command":"initialize","arguments":{"clientID":"test"}}"#,
        "not json",
        r#"{"seq":2,"type":"request","command":"attach","arguments":{}}"#,
        r#"{"seq":3,"type":"request","command":"disconnect"}"#,
        r#"{"seq":4,"type":"request","command":"threads"}"#,
    ] {
        write_message(&mut input, payload).unwrap();
    }

    let fixture = fixture();
    let mut adapter = fixture.adapter;
    let output = SharedBuffer::default();
    adapter
        .run(BufReader::new(&input[..]), output.clone())
        .unwrap();

    let bytes = output.0.lock().clone();
    let mut reader = BufReader::new(&bytes[..]);
    let mut messages = Vec::new();
    while let Some(payload) = read_message(&mut reader).unwrap() {
        let value: Value = serde_json::from_str(&payload).unwrap();
        if value["type"] == "response" {
            messages.push(format!("response {}", value["command"].as_str().unwrap()));
        } else if value["event"] != "thread" && value["event"] != "loadedSource" {
            messages.push(format!("event {}", value["event"].as_str().unwrap()));
        }
    }
    assert_eq!(
        messages,
        [
            "response initialize",
            "event initialized",
            "response attach",
            "response disconnect",
            "event terminated",
        ]
    );
    assert!(adapter.session().is_ended());
}

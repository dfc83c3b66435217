//! Adapter core loop + request dispatch.
//! - DebugAdapter::new/with_config: construction
//! - run/run_stdio: protocol loop + session event writer
//! - dispatch_request: route DAP requests
//! - response/event helpers

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use papyrus_runtime::DebugError;

use crate::config::{DebugServerConfig, ENV_PROTOCOL_LOG};
use crate::protocol::{
    Event, LoadedSourceEventBody, MessageType, OutputEventBody, Request, Response,
    StoppedEventBody, ThreadEventBody,
};
use crate::session::{DebugSession, SessionEvent};

use super::protocol_io::{read_message, write_message_locked, write_protocol_log, ProtocolLog};
use super::{DebugAdapter, DispatchOutcome, StopGate};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Outbound half of the protocol stream, shared with the event writer.
#[derive(Clone)]
struct Transport {
    writer: SharedWriter,
    log: Option<Arc<ProtocolLog>>,
}

impl Transport {
    fn send(&self, message: &Value) -> io::Result<()> {
        let serialized = serde_json::to_string(message)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        if let Some(logger) = &self.log {
            let _ = write_protocol_log(logger, "->", &serialized);
        }
        write_message_locked(&self.writer, &serialized)
    }

    fn log_inbound(&self, payload: &str) {
        if let Some(logger) = &self.log {
            let _ = write_protocol_log(logger, "<-", payload);
        }
    }
}

impl DebugAdapter {
    #[must_use]
    pub fn new(session: DebugSession) -> Self {
        Self {
            session,
            next_seq: Arc::new(AtomicU32::new(1)),
            verbose: false,
            protocol_log: None,
            stop_gate: StopGate::default(),
        }
    }

    /// Adapter with transcript and verbose echo taken from `config`.
    #[must_use]
    pub fn with_config(session: DebugSession, config: &DebugServerConfig) -> Self {
        let mut adapter = Self::new(session);
        adapter.verbose = config.verbose;
        adapter.protocol_log.clone_from(&config.protocol_log);
        adapter
    }

    #[must_use]
    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    /// Run a blocking stdio loop that processes DAP requests.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let reader = BufReader::new(stdin.lock());
        self.run(reader, BufWriter::new(io::stdout()))
    }

    /// Serve requests from `reader` until the client disconnects or the
    /// stream closes. The session is ended on return.
    pub fn run<R, W>(&mut self, mut reader: R, writer: W) -> io::Result<()>
    where
        R: BufRead,
        W: Write + Send + 'static,
    {
        let writer: Box<dyn Write + Send> = Box::new(writer);
        let transport = Transport {
            writer: Arc::new(Mutex::new(writer)),
            log: self.open_protocol_log(),
        };
        let (done_tx, done_rx) = bounded::<()>(1);
        let event_thread = self.spawn_event_writer(transport.clone(), done_rx);

        let result = self.serve(&mut reader, &transport);

        self.session.end();
        drop(done_tx);
        let _ = event_thread.join();
        result
    }

    fn serve<R: BufRead>(&mut self, reader: &mut R, transport: &Transport) -> io::Result<()> {
        if self.verbose {
            let hint = match &self.protocol_log {
                Some(path) => format!(
                    "[papyrus-debug] DAP verbose logging enabled; raw log: {}",
                    path.display()
                ),
                None => format!(
                    "[papyrus-debug] DAP verbose logging enabled (set {ENV_PROTOCOL_LOG}=/path for raw)"
                ),
            };
            transport.send(&self.output_message(hint))?;
        }

        loop {
            let Some(payload) = read_message(reader)? else {
                tracing::debug!("protocol stream closed");
                break;
            };
            transport.log_inbound(&payload);
            if self.verbose {
                let echo = format!(
                    "[papyrus-debug][dap<-] len={} payload={payload}",
                    payload.len()
                );
                transport.send(&self.output_message(echo))?;
            }

            let request: Request<Value> = match serde_json::from_str(&payload) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(%err, "ignoring malformed protocol message");
                    continue;
                }
            };

            tracing::trace!(seq = request.seq, command = %request.command, "dispatch");
            let outcome = self.dispatch_request(request);
            for message in outcome.responses.iter().chain(&outcome.events) {
                transport.send(message)?;
                if self.verbose {
                    let echo = format!("[papyrus-debug][dap->] {message}");
                    transport.send(&self.output_message(echo))?;
                }
            }
            drop(outcome.stop_gate);
            if outcome.should_exit {
                break;
            }
        }
        Ok(())
    }

    fn open_protocol_log(&self) -> Option<Arc<ProtocolLog>> {
        let path = self.protocol_log.as_ref()?;
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(Mutex::new(BufWriter::new(file)))),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "cannot open protocol log");
                None
            }
        }
    }

    fn spawn_event_writer(&self, transport: Transport, done: Receiver<()>) -> JoinHandle<()> {
        let events = self.session.events();
        let seq = Arc::clone(&self.next_seq);
        let stop_gate = self.stop_gate.clone();
        thread::spawn(move || loop {
            select! {
                recv(events) -> event => {
                    let Ok(event) = event else { break };
                    if matches!(event, SessionEvent::Stopped(_)) {
                        stop_gate.wait_clear();
                    }
                    if let Err(err) = transport.send(&session_event(&seq, event)) {
                        tracing::warn!(%err, "failed to write event");
                        break;
                    }
                }
                recv(done) -> _ => break,
            }
        })
    }

    pub(super) fn dispatch_request(&mut self, request: Request<Value>) -> DispatchOutcome {
        if request.message_type != MessageType::Request {
            return DispatchOutcome::default();
        }

        match request.command.as_str() {
            "initialize" => self.handle_initialize(request),
            "attach" => self.handle_attach(request),
            "configurationDone" => self.handle_configuration_done(request),
            "disconnect" => self.handle_disconnect(request),
            "terminate" => self.handle_terminate(request),
            "setBreakpoints" => self.handle_set_breakpoints(request),
            "setFunctionBreakpoints" => self.handle_set_function_breakpoints(request),
            "setExceptionBreakpoints" => self.handle_set_exception_breakpoints(request),
            "threads" => self.handle_threads(request),
            "stackTrace" => self.handle_stack_trace(request),
            "scopes" => self.handle_scopes(request),
            "variables" => self.handle_variables(request),
            "source" => self.handle_source(request),
            "loadedSources" => self.handle_loaded_sources(request),
            "continue" => self.handle_continue(request),
            "pause" => self.handle_pause(request),
            "next" => self.handle_next(request),
            "stepIn" => self.handle_step_in(request),
            "stepOut" => self.handle_step_out(request),
            _ => DispatchOutcome {
                responses: vec![self.error_response(&request, "unsupported command")],
                ..DispatchOutcome::default()
            },
        }
    }

    /// Decode typed arguments, or produce the `invalid <command> args` reply.
    pub(super) fn arguments<T: serde::de::DeserializeOwned>(
        &self,
        request: &Request<Value>,
    ) -> Result<T, DispatchOutcome> {
        request
            .arguments
            .clone()
            .and_then(|value| serde_json::from_value::<T>(value).ok())
            .ok_or_else(|| DispatchOutcome {
                responses: vec![self.error_response(
                    request,
                    &format!("invalid {} args", request.command),
                )],
                ..DispatchOutcome::default()
            })
    }

    /// Single response for a session call.
    pub(super) fn respond<T: Serialize>(
        &self,
        request: &Request<Value>,
        result: Result<T, DebugError>,
    ) -> DispatchOutcome {
        let response = match result {
            Ok(body) => self.ok_response(request, Some(body)),
            Err(err) => {
                tracing::debug!(command = %request.command, %err, "request failed");
                self.error_response(request, &err.to_string())
            }
        };
        DispatchOutcome {
            responses: vec![response],
            ..DispatchOutcome::default()
        }
    }

    /// Bodiless response for a session call.
    pub(super) fn respond_empty(
        &self,
        request: &Request<Value>,
        result: Result<(), DebugError>,
    ) -> DispatchOutcome {
        let response = match result {
            Ok(()) => self.ok_response::<Value>(request, None),
            Err(err) => {
                tracing::debug!(command = %request.command, %err, "request failed");
                self.error_response(request, &err.to_string())
            }
        };
        DispatchOutcome {
            responses: vec![response],
            ..DispatchOutcome::default()
        }
    }

    fn next_seq(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn ok_response<T>(&self, request: &Request<Value>, body: Option<T>) -> Value
    where
        T: Serialize,
    {
        let body = body
            .map(|payload| serde_json::to_value(payload))
            .transpose()
            .unwrap_or(None);
        let response = Response {
            seq: self.next_seq(),
            message_type: MessageType::Response,
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        };
        serde_json::to_value(response).unwrap_or(Value::Null)
    }

    pub(super) fn error_response(&self, request: &Request<Value>, message: &str) -> Value {
        let response: Response<Value> = Response {
            seq: self.next_seq(),
            message_type: MessageType::Response,
            request_seq: request.seq,
            success: false,
            command: request.command.clone(),
            message: Some(message.to_string()),
            body: None,
        };
        serde_json::to_value(response).unwrap_or(Value::Null)
    }

    pub(super) fn event<T>(&self, name: &str, body: Option<T>) -> Value
    where
        T: Serialize,
    {
        encode_event(&self.next_seq, name, body)
    }

    pub(super) fn output_message(&self, message: impl Into<String>) -> Value {
        let mut output = message.into();
        if !output.ends_with('\n') {
            output.push('\n');
        }
        self.event(
            "output",
            Some(OutputEventBody {
                output,
                category: Some("console".to_string()),
                source: None,
                line: None,
            }),
        )
    }
}

fn encode_event<T: Serialize>(seq: &AtomicU32, name: &str, body: Option<T>) -> Value {
    let body = body
        .map(|payload| serde_json::to_value(payload))
        .transpose()
        .unwrap_or(None);
    let event = Event {
        seq: seq.fetch_add(1, Ordering::Relaxed),
        message_type: MessageType::Event,
        event: name.to_string(),
        body,
    };
    serde_json::to_value(event).unwrap_or(Value::Null)
}

pub(super) fn session_event(seq: &AtomicU32, event: SessionEvent) -> Value {
    match event {
        SessionEvent::Stopped(stop) => encode_event(
            seq,
            "stopped",
            Some(StoppedEventBody {
                reason: stop.reason.as_str().to_string(),
                thread_id: Some(stop.thread_id.0),
                all_threads_stopped: Some(false),
            }),
        ),
        SessionEvent::Thread { reason, thread_id } => encode_event(
            seq,
            "thread",
            Some(ThreadEventBody {
                reason: reason.as_str().to_string(),
                thread_id: thread_id.0,
            }),
        ),
        SessionEvent::LoadedSource(source) => encode_event(
            seq,
            "loadedSource",
            Some(LoadedSourceEventBody {
                reason: "new".to_string(),
                source,
            }),
        ),
        SessionEvent::Output { category, output } => encode_event(
            seq,
            "output",
            Some(OutputEventBody {
                output,
                category: Some(category.to_string()),
                source: None,
                line: None,
            }),
        ),
    }
}

//! Debug Adapter Protocol (DAP) server for the Papyrus script VM.

mod adapter;
pub mod config;
pub mod logging;
mod protocol;
pub mod session;
pub mod state;

pub use adapter::DebugAdapter;
pub use config::DebugServerConfig;
pub use protocol::{
    AttachArguments, Breakpoint, Capabilities, ContinueArguments, ContinueResponseBody,
    DisconnectArguments, Event, FunctionBreakpoint, InitializeArguments, InitializeResponseBody,
    LoadedSourceEventBody, LoadedSourcesResponseBody, MessageType, NextArguments,
    OutputEventBody, PauseArguments, Request, Response, Scope, ScopesArguments,
    ScopesResponseBody, SetBreakpointsArguments, SetBreakpointsResponseBody,
    SetFunctionBreakpointsArguments, Source, SourceArguments, SourceBreakpoint,
    SourceResponseBody, StackFrame, StackTraceArguments, StackTraceResponseBody, StepInArguments,
    StepOutArguments, StoppedEventBody, TerminateArguments, TerminatedEventBody, Thread,
    ThreadEventBody, ThreadsResponseBody, Variable, VariablesArguments, VariablesResponseBody,
};
pub use session::{DebugSession, SessionEvent, ThreadReason};

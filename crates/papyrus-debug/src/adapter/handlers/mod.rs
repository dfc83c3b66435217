//! Request handlers grouped by DAP area.
//! - initialize: initialize/attach/configurationDone
//! - breakpoints: line, function and exception breakpoints
//! - lifecycle: disconnect/terminate
//! - threads: thread list
//! - stack_trace: stackTrace request
//! - scopes: scopes and variables
//! - sources: source text and loaded sources
//! - run_control: continue/pause/step

mod breakpoints;
mod initialize;
mod lifecycle;
mod run_control;
mod scopes;
mod sources;
mod stack_trace;
mod threads;

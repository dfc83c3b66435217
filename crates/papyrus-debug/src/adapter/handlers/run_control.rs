//! Continue/pause/step handlers.
//! - handle_continue: resume every paused thread
//! - handle_pause: request a stop on every running thread
//! - handle_next/step_in/step_out: stepping commands
//!
//! Each holds the stop gate across the session call so the `stopped`
//! event that follows cannot overtake the response.

use serde_json::Value;

use papyrus_runtime::debug::StepKind;

use crate::protocol::{
    ContinueArguments, NextArguments, PauseArguments, Request, StepInArguments, StepOutArguments,
};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_continue(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<ContinueArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let stop_gate = self.stop_gate.enter();
        let result = self.session.continue_(args.thread_id);
        let mut outcome = self.respond(&request, result);
        outcome.stop_gate = Some(stop_gate);
        outcome
    }

    pub(in crate::adapter) fn handle_pause(&mut self, request: Request<Value>) -> DispatchOutcome {
        let args = match self.arguments::<PauseArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let stop_gate = self.stop_gate.enter();
        let result = self.session.pause(args.thread_id);
        let mut outcome = self.respond_empty(&request, result);
        outcome.stop_gate = Some(stop_gate);
        outcome
    }

    pub(in crate::adapter) fn handle_next(&mut self, request: Request<Value>) -> DispatchOutcome {
        let args = match self.arguments::<NextArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        self.step(&request, args.thread_id, StepKind::Over)
    }

    pub(in crate::adapter) fn handle_step_in(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<StepInArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        self.step(&request, args.thread_id, StepKind::Into)
    }

    pub(in crate::adapter) fn handle_step_out(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<StepOutArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        self.step(&request, args.thread_id, StepKind::Out)
    }

    fn step(&mut self, request: &Request<Value>, thread_id: u32, kind: StepKind) -> DispatchOutcome {
        let stop_gate = self.stop_gate.enter();
        let result = self.session.step(thread_id, kind);
        let mut outcome = self.respond_empty(request, result);
        outcome.stop_gate = Some(stop_gate);
        outcome
    }
}

//! Breakpoint handlers.
//! - handle_set_breakpoints: replace a script's line breakpoints
//! - handle_set_function_breakpoints: reject each entry
//! - handle_set_exception_breakpoints: accepted and ignored

use serde_json::Value;

use crate::protocol::{
    Breakpoint, Request, SetBreakpointsArguments, SetBreakpointsResponseBody,
    SetFunctionBreakpointsArguments,
};

use super::super::{DebugAdapter, DispatchOutcome};

const FUNCTION_BREAKPOINTS_UNSUPPORTED: &str = "function breakpoints are not supported";

impl DebugAdapter {
    pub(in crate::adapter) fn handle_set_breakpoints(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<SetBreakpointsArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.set_breakpoints(&args);
        self.respond(&request, result)
    }

    pub(in crate::adapter) fn handle_set_function_breakpoints(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<SetFunctionBreakpointsArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let body = SetBreakpointsResponseBody {
            breakpoints: args
                .breakpoints
                .iter()
                .map(|_| Breakpoint::unsupported(FUNCTION_BREAKPOINTS_UNSUPPORTED))
                .collect(),
        };
        DispatchOutcome {
            responses: vec![self.ok_response(&request, Some(body))],
            ..DispatchOutcome::default()
        }
    }

    pub(in crate::adapter) fn handle_set_exception_breakpoints(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            responses: vec![self.ok_response::<Value>(&request, None)],
            ..DispatchOutcome::default()
        }
    }
}

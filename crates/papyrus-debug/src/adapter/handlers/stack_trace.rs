//! Stack trace request.
//! - handle_stack_trace: frames of one paused or running stack

use serde_json::Value;

use crate::protocol::{Request, StackTraceArguments};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_stack_trace(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<StackTraceArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.stack_trace(&args);
        self.respond(&request, result)
    }
}

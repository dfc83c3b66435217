//! Scope and variable handlers.
//! - handle_scopes: Local/Self scopes of a frame handle
//! - handle_variables: children of a scope or expandable value

use serde_json::Value;

use crate::protocol::{Request, ScopesArguments, VariablesArguments};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_scopes(&mut self, request: Request<Value>) -> DispatchOutcome {
        let args = match self.arguments::<ScopesArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.scopes(args.frame_id);
        self.respond(&request, result)
    }

    pub(in crate::adapter) fn handle_variables(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = match self.arguments::<VariablesArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.variables(&args);
        self.respond(&request, result)
    }
}

//! Source handlers.
//! - handle_source: decompiled text by name or reference
//! - handle_loaded_sources: every script the VM has loaded

use serde_json::Value;

use crate::protocol::{Request, SourceArguments};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_source(&mut self, request: Request<Value>) -> DispatchOutcome {
        let args = match self.arguments::<SourceArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.source(&args);
        self.respond(&request, result)
    }

    pub(in crate::adapter) fn handle_loaded_sources(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let body = self.session.loaded_sources();
        DispatchOutcome {
            responses: vec![self.ok_response(&request, Some(body))],
            ..DispatchOutcome::default()
        }
    }
}

//! Adapter lifecycle handlers.
//! - handle_disconnect: tear down session
//! - handle_terminate: same teardown, requested by the client

use serde_json::Value;

use crate::protocol::{DisconnectArguments, Request, TerminateArguments, TerminatedEventBody};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_disconnect(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let restart = request
            .arguments
            .clone()
            .and_then(|value| serde_json::from_value::<DisconnectArguments>(value).ok())
            .and_then(|args| args.restart);
        self.shutdown(&request, restart)
    }

    pub(in crate::adapter) fn handle_terminate(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let restart = request
            .arguments
            .clone()
            .and_then(|value| serde_json::from_value::<TerminateArguments>(value).ok())
            .and_then(|args| args.restart);
        self.shutdown(&request, restart)
    }

    fn shutdown(&mut self, request: &Request<Value>, restart: Option<bool>) -> DispatchOutcome {
        tracing::info!(command = %request.command, "client requested shutdown");
        self.session.end();
        let terminated = self.event("terminated", Some(TerminatedEventBody { restart }));
        DispatchOutcome {
            responses: vec![self.ok_response::<Value>(request, None)],
            events: vec![terminated],
            should_exit: true,
            ..DispatchOutcome::default()
        }
    }
}

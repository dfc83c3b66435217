//! Session setup handlers.
//! - handle_initialize: advertise capabilities
//! - handle_attach: bind the session to the VM
//! - handle_configuration_done: end of client configuration

use serde_json::Value;

use crate::protocol::{
    AttachArguments, Capabilities, InitializeArguments, InitializeResponseBody, Request,
};

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_initialize(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let args = request
            .arguments
            .clone()
            .and_then(|value| serde_json::from_value::<InitializeArguments>(value).ok())
            .unwrap_or_default();
        tracing::info!(
            client = args.client_id.as_deref().unwrap_or("unknown"),
            adapter = args.adapter_id.as_deref().unwrap_or("unknown"),
            "initialize"
        );

        let body = InitializeResponseBody {
            capabilities: Capabilities {
                supports_configuration_done_request: Some(true),
                supports_loaded_sources_request: Some(true),
                supports_function_breakpoints: Some(false),
                supports_conditional_breakpoints: Some(false),
                supports_terminate_request: Some(true),
            },
        };
        DispatchOutcome {
            responses: vec![self.ok_response(&request, Some(body))],
            events: vec![self.event::<Value>("initialized", None)],
            ..DispatchOutcome::default()
        }
    }

    pub(in crate::adapter) fn handle_attach(&mut self, request: Request<Value>) -> DispatchOutcome {
        let args = match self.arguments::<AttachArguments>(&request) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };
        let result = self.session.attach(args);
        self.respond_empty(&request, result)
    }

    pub(in crate::adapter) fn handle_configuration_done(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            responses: vec![self.ok_response::<Value>(&request, None)],
            ..DispatchOutcome::default()
        }
    }
}

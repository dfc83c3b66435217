//! Thread requests.
//! - handle_threads: enumerate VM stacks

use serde_json::Value;

use crate::protocol::Request;

use super::super::{DebugAdapter, DispatchOutcome};

impl DebugAdapter {
    pub(in crate::adapter) fn handle_threads(
        &mut self,
        request: Request<Value>,
    ) -> DispatchOutcome {
        let result = self.session.threads();
        self.respond(&request, result)
    }
}

//! Debugging support: breakpoints, execution control and stop notifications.

#![allow(missing_docs)]

mod breakpoints;
mod control;
mod gate;
mod types;

pub use breakpoints::BreakpointManager;
pub use control::{ExecutionControl, SuspensionObserver};
pub use gate::SuspendGate;
pub use types::{
    normalize_script_name, BreakpointLine, DebugStop, DebugStopReason, ExecutionState, SourceRef,
    StepKind,
};

//! Debugger errors surfaced at the request boundary.

use smol_str::SmolStr;
use thiserror::Error;

use crate::vm::StackId;

/// Errors reported to the client as failed responses.
///
/// None of these end the session; the only fatal condition is
/// [`DebugError::VmUnavailable`] while attaching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    /// The requested source has no compiled script.
    #[error("Could not find PEX data for script {0}")]
    ScriptNotFound(SmolStr),

    /// The script was compiled or loaded without line tables.
    #[error(
        "No debug data for script {script}. Ensure that `bLoadDebugInformation=1` is set under `[Papyrus]` in {ini}"
    )]
    NoDebugInfo {
        /// Normalized script name.
        script: SmolStr,
        /// Game INI file holding the setting.
        ini: &'static str,
    },

    /// The client's copy of the source changed after it was loaded.
    #[error("Script {0} has been modified after load; reload the game to debug the new version")]
    StaleSource(SmolStr),

    /// Frame, scope or variable handle is stale or was never issued.
    #[error("No such variable reference {0}")]
    UnknownHandle(u32),

    /// No live or paused thread with this id.
    #[error("Could not find thread {0}")]
    UnknownThread(StackId),

    /// The thread exists but is not in a state that allows the request.
    #[error("Thread {0} is not paused")]
    ThreadNotPaused(StackId),

    /// A node could not be converted to its protocol shape.
    #[error("Serialization error: {0}")]
    SerializationFailure(SmolStr),

    /// Source request without a usable name.
    #[error("No source name or sourceReference")]
    MissingSource,

    /// The script cache could not produce source text.
    #[error("Could not find source {0}")]
    SourceUnavailable(SmolStr),

    /// Hooks or enumeration on the VM could not be reached.
    #[error("Papyrus VM is not available")]
    VmUnavailable,

    /// A request that needs a live session arrived before `attach`.
    #[error("Debugger is not attached")]
    NotAttached,
}

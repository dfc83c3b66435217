//! Debug data types.

#![allow(missing_docs)]

use std::hash::Hasher;

use rustc_hash::FxHasher;
use smol_str::SmolStr;

use crate::vm::StackId;

const SCRIPT_EXTENSIONS: [&str; 2] = [".psc", ".pex"];

/// Normalize a client or VM script name for identity comparisons.
///
/// `Quests/MyQuest.psc`, `quests\myquest` and `QUESTS:MYQUEST.pex` all
/// normalize to `quests:myquest`.
#[must_use]
pub fn normalize_script_name(name: &str) -> SmolStr {
    normalized_bytes(name).map(char::from).collect()
}

fn strip_extensions(mut name: &str) -> &str {
    'strip: loop {
        for extension in SCRIPT_EXTENSIONS {
            let Some(split) = name.len().checked_sub(extension.len()) else {
                continue;
            };
            if name.is_char_boundary(split)
                && name[split..].eq_ignore_ascii_case(extension)
            {
                name = &name[..split];
                continue 'strip;
            }
        }
        return name;
    }
}

fn normalized_bytes(name: &str) -> impl Iterator<Item = u8> + '_ {
    strip_extensions(name.trim()).bytes().map(|byte| match byte {
        b'/' | b'\\' => b':',
        other => other.to_ascii_lowercase(),
    })
}

/// Client-visible source identity, derived from the normalized script name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceRef(pub u32);

impl SourceRef {
    /// Hash `name` as if it were normalized first, without allocating.
    #[must_use]
    pub fn from_script_name(name: &str) -> Self {
        let mut hasher = FxHasher::default();
        for byte in normalized_bytes(name) {
            hasher.write_u8(byte);
        }
        #[allow(clippy::cast_possible_truncation)]
        let value = (hasher.finish() as u32) & 0x7fff_ffff;
        Self(value.max(1))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Stop reason for debugger events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugStopReason {
    /// Paused due to a breakpoint.
    Breakpoint,
    /// Paused due to stepping.
    Step,
    /// Paused due to a user pause request.
    Pause,
}

impl DebugStopReason {
    /// Reason string used in `stopped` events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DebugStopReason::Breakpoint => "breakpoint",
            DebugStopReason::Step => "step",
            DebugStopReason::Pause => "pause",
        }
    }
}

/// Notification emitted when a VM thread suspends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugStop {
    pub reason: DebugStopReason,
    pub thread_id: StackId,
    /// Owning script of the top frame at the stop.
    pub script: SmolStr,
    pub line: Option<u32>,
}

/// Step behavior while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Stop at the next instruction, regardless of call depth.
    Into,
    /// Stop at the next instruction at the same or a shallower depth.
    Over,
    /// Stop at the next instruction at a shallower depth.
    Out,
}

/// Per-thread execution state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionState {
    #[default]
    Running,
    SteppingIn,
    SteppingOut,
    SteppingOver,
    Paused,
}

impl From<StepKind> for ExecutionState {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Into => ExecutionState::SteppingIn,
            StepKind::Over => ExecutionState::SteppingOver,
            StepKind::Out => ExecutionState::SteppingOut,
        }
    }
}

/// Result of verifying one requested breakpoint line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointLine {
    pub line: u32,
    pub verified: bool,
}

//! Compiled script cache collaborator.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use smol_str::SmolStr;

/// Line table for one function in a compiled script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDebugInfo {
    pub object_name: SmolStr,
    pub state_name: SmolStr,
    pub function_name: SmolStr,
    /// Source line for each instruction, in instruction order.
    pub line_numbers: Vec<u32>,
}

/// A loaded PEX binary, reduced to what the debugger needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub name: SmolStr,
    pub source_file: Option<SmolStr>,
    /// Empty when the script carries no debug information.
    pub functions: Vec<FunctionDebugInfo>,
}

impl CompiledScript {
    #[must_use]
    pub fn has_debug_info(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Whether any function's line table contains `line` exactly.
    #[must_use]
    pub fn has_line(&self, line: u32) -> bool {
        self.functions
            .iter()
            .any(|function| function.line_numbers.contains(&line))
    }
}

/// Client-facing description of a script's source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: SmolStr,
    pub path: Option<PathBuf>,
    /// Milliseconds since the Unix epoch.
    pub modified_time: Option<i64>,
}

/// Lookup interface over the host's compiled-script cache.
///
/// Names are normalized script names (see
/// [`normalize_script_name`](crate::debug::normalize_script_name)).
pub trait ScriptCache: Send + Sync {
    fn find_compiled_script(&self, name: &str) -> Option<Arc<CompiledScript>>;

    /// Whether the script has already been loaded into the cache.
    fn has_source(&self, name: &str) -> bool;

    fn decompiled_source(&self, name: &str) -> Option<String>;

    fn source_metadata(&self, name: &str) -> Option<SourceDescriptor>;

    /// Drop every cached script.
    fn clear(&self);
}

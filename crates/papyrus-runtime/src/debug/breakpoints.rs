//! Line breakpoint registry and the per-instruction hit test.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::DebugError;
use crate::game::Game;
use crate::script::ScriptCache;
use crate::vm::ExecutingThread;

use super::{normalize_script_name, BreakpointLine, SourceRef};

/// Active line breakpoints per source.
///
/// The hit test only takes the read side of the lock; `set_breakpoints`
/// takes the write side once per request.
pub struct BreakpointManager {
    scripts: Arc<dyn ScriptCache>,
    game: Game,
    breakpoints: RwLock<FxHashMap<SourceRef, FxHashSet<u32>>>,
}

impl BreakpointManager {
    #[must_use]
    pub fn new(scripts: Arc<dyn ScriptCache>, game: Game) -> Self {
        Self {
            scripts,
            game,
            breakpoints: RwLock::new(FxHashMap::default()),
        }
    }

    /// Replace every breakpoint of `source_name` with `lines`.
    ///
    /// Lines that do not appear in any function's line table are reported
    /// unverified but stored all the same.
    pub fn set_breakpoints(
        &self,
        source_name: &str,
        lines: &[u32],
    ) -> Result<Vec<BreakpointLine>, DebugError> {
        let script_name = normalize_script_name(source_name);
        let script = self
            .scripts
            .find_compiled_script(&script_name)
            .ok_or_else(|| DebugError::ScriptNotFound(script_name.clone()))?;
        if !script.has_debug_info() {
            return Err(DebugError::NoDebugInfo {
                script: script_name,
                ini: self.game.ini_name(),
            });
        }

        let verified = lines
            .iter()
            .map(|&line| BreakpointLine {
                line,
                verified: script.has_line(line),
            })
            .collect::<Vec<_>>();

        let reference = SourceRef::from_script_name(&script_name);
        let mut breakpoints = self.breakpoints.write();
        if lines.is_empty() {
            breakpoints.remove(&reference);
        } else {
            breakpoints.insert(reference, lines.iter().copied().collect());
        }
        drop(breakpoints);

        tracing::debug!(
            script = %script_name,
            requested = lines.len(),
            verified = verified.iter().filter(|bp| bp.verified).count(),
            "breakpoints replaced"
        );
        Ok(verified)
    }

    /// Remove every breakpoint for every source.
    pub fn clear_breakpoints(&self) {
        self.breakpoints.write().clear();
    }

    /// Whether the thread's current instruction sits on an active breakpoint.
    ///
    /// Runs on the VM thread for every instruction of every non-native call.
    pub fn is_at_active_breakpoint(&self, thread: &dyn ExecutingThread) -> bool {
        if thread.is_native() {
            return false;
        }
        let reference = SourceRef::from_script_name(thread.script_name());
        let breakpoints = self.breakpoints.read();
        let Some(lines) = breakpoints.get(&reference) else {
            return false;
        };
        thread
            .current_line()
            .is_some_and(|line| lines.contains(&line))
    }

    /// Lines currently stored for a source, sorted.
    #[must_use]
    pub fn lines_for(&self, source_name: &str) -> Vec<u32> {
        let reference = SourceRef::from_script_name(source_name);
        let mut lines = self
            .breakpoints
            .read()
            .get(&reference)
            .map(|lines| lines.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        lines.sort_unstable();
        lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakpoints.read().is_empty()
    }
}

impl std::fmt::Debug for BreakpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointManager")
            .field("game", &self.game)
            .field("sources", &self.breakpoints.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{MemoryScriptCache, TestThread};
    use crate::vm::StackId;

    fn manager() -> BreakpointManager {
        let scripts = MemoryScriptCache::new();
        scripts.insert_lines("Quest", &[3, 5, 10, 12]);
        scripts.insert_script("Bare", Vec::new());
        BreakpointManager::new(Arc::new(scripts), Game::Skyrim)
    }

    fn at(script: &str, line: u32) -> TestThread {
        TestThread::new(StackId(1), script, Some(line))
    }

    #[test]
    fn verification_uses_exact_line_membership() {
        let manager = manager();
        let result = manager.set_breakpoints("Quest.psc", &[4, 5, 12]).unwrap();
        assert_eq!(
            result,
            vec![
                BreakpointLine {
                    line: 4,
                    verified: false
                },
                BreakpointLine {
                    line: 5,
                    verified: true
                },
                BreakpointLine {
                    line: 12,
                    verified: true
                },
            ]
        );
        assert_eq!(manager.lines_for("quest"), vec![4, 5, 12]);
    }

    #[test]
    fn unverified_lines_still_hit() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[4]).unwrap();
        assert!(manager.is_at_active_breakpoint(&at("Quest", 4)));
    }

    #[test]
    fn setting_breakpoints_replaces_previous_set() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[5, 10]).unwrap();
        manager.set_breakpoints("quest", &[7]).unwrap();

        assert!(manager.is_at_active_breakpoint(&at("QUEST", 7)));
        assert!(!manager.is_at_active_breakpoint(&at("Quest", 5)));
        assert!(!manager.is_at_active_breakpoint(&at("Quest", 10)));
    }

    #[test]
    fn empty_request_removes_source() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[5]).unwrap();
        manager.set_breakpoints("Quest.psc", &[]).unwrap();
        assert!(manager.is_empty());
    }

    #[test]
    fn native_frames_never_hit() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[5]).unwrap();
        assert!(!manager.is_at_active_breakpoint(&at("Quest", 5).native()));
    }

    #[test]
    fn frames_without_line_info_never_hit() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[5]).unwrap();
        let thread = TestThread::new(StackId(1), "Quest", None);
        assert!(!manager.is_at_active_breakpoint(&thread));
    }

    #[test]
    fn missing_script_and_missing_debug_info_fail() {
        let manager = manager();
        assert_eq!(
            manager.set_breakpoints("Nowhere.psc", &[1]),
            Err(DebugError::ScriptNotFound("nowhere".into()))
        );
        let err = manager.set_breakpoints("Bare.psc", &[1]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No debug data for script bare. Ensure that `bLoadDebugInformation=1` is set under `[Papyrus]` in skyrim.ini"
        );
    }

    #[test]
    fn clear_removes_everything() {
        let manager = manager();
        manager.set_breakpoints("Quest.psc", &[5]).unwrap();
        manager.clear_breakpoints();
        assert!(manager.is_empty());
        assert!(!manager.is_at_active_breakpoint(&at("Quest", 5)));
    }
}

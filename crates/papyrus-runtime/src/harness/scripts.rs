//! Script cache backed by in-memory tables.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::debug::normalize_script_name;
use crate::script::{CompiledScript, FunctionDebugInfo, ScriptCache, SourceDescriptor};

#[derive(Debug, Clone)]
struct StoredScript {
    compiled: Arc<CompiledScript>,
    source: Option<String>,
    path: Option<PathBuf>,
    modified_time: Option<i64>,
}

/// Script cache over a fixed set of scripts.
///
/// Scripts behave like files on disk: `find_compiled_script` loads them on
/// demand, `clear` only forgets what was loaded.
#[derive(Debug, Default)]
pub struct MemoryScriptCache {
    scripts: RwLock<FxHashMap<SmolStr, StoredScript>>,
    loaded: RwLock<FxHashSet<SmolStr>>,
    clears: RwLock<u32>,
}

impl MemoryScriptCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script with explicit per-function line tables.
    pub fn insert_script(&self, name: &str, functions: Vec<FunctionDebugInfo>) {
        let key = normalize_script_name(name);
        let compiled = Arc::new(CompiledScript {
            name: SmolStr::new(name),
            source_file: Some(SmolStr::new(format!("{name}.psc"))),
            functions,
        });
        self.scripts.write().insert(
            key,
            StoredScript {
                compiled,
                source: None,
                path: None,
                modified_time: None,
            },
        );
    }

    /// Add a script whose single function covers `lines`.
    pub fn insert_lines(&self, name: &str, lines: &[u32]) {
        self.insert_script(
            name,
            vec![FunctionDebugInfo {
                object_name: SmolStr::new(name),
                state_name: SmolStr::default(),
                function_name: SmolStr::new_static("OnInit"),
                line_numbers: lines.to_vec(),
            }],
        );
    }

    /// Attach decompiled source text to a known script.
    pub fn set_source(&self, name: &str, text: impl Into<String>) {
        if let Some(script) = self.scripts.write().get_mut(&normalize_script_name(name)) {
            script.source = Some(text.into());
        }
    }

    pub fn set_source_file(&self, name: &str, path: impl Into<PathBuf>, modified_time: i64) {
        if let Some(script) = self.scripts.write().get_mut(&normalize_script_name(name)) {
            script.path = Some(path.into());
            script.modified_time = Some(modified_time);
        }
    }

    /// Mark a script as already loaded, as if the VM had used it.
    pub fn mark_loaded(&self, name: &str) {
        self.loaded.write().insert(normalize_script_name(name));
    }

    /// Number of times [`ScriptCache::clear`] ran.
    #[must_use]
    pub fn clear_count(&self) -> u32 {
        *self.clears.read()
    }
}

impl ScriptCache for MemoryScriptCache {
    fn find_compiled_script(&self, name: &str) -> Option<Arc<CompiledScript>> {
        let key = normalize_script_name(name);
        let compiled = self.scripts.read().get(&key)?.compiled.clone();
        self.loaded.write().insert(key);
        Some(compiled)
    }

    fn has_source(&self, name: &str) -> bool {
        self.loaded.read().contains(&normalize_script_name(name))
    }

    fn decompiled_source(&self, name: &str) -> Option<String> {
        let key = normalize_script_name(name);
        let source = self.scripts.read().get(&key)?.source.clone()?;
        self.loaded.write().insert(key);
        Some(source)
    }

    fn source_metadata(&self, name: &str) -> Option<SourceDescriptor> {
        let key = normalize_script_name(name);
        let descriptor = {
            let scripts = self.scripts.read();
            let script = scripts.get(&key)?;
            SourceDescriptor {
                name: script
                    .compiled
                    .source_file
                    .clone()
                    .unwrap_or_else(|| script.compiled.name.clone()),
                path: script.path.clone(),
                modified_time: script.modified_time,
            }
        };
        self.loaded.write().insert(key);
        Some(descriptor)
    }

    fn clear(&self) {
        self.loaded.write().clear();
        *self.clears.write() += 1;
    }
}

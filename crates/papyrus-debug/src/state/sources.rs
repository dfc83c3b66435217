//! Client-facing source descriptors and project source overrides.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;

use papyrus_runtime::debug::{normalize_script_name, SourceRef};
use papyrus_runtime::script::ScriptCache;

use crate::protocol::Source;

/// Maps script names to protocol [`Source`]s.
///
/// Sources the client attached with are remembered per [`SourceRef`] and
/// win over what the script cache reports.
pub struct SourceCatalog {
    scripts: Arc<dyn ScriptCache>,
    project: RwLock<IndexMap<SourceRef, Source>>,
}

impl SourceCatalog {
    #[must_use]
    pub fn new(scripts: Arc<dyn ScriptCache>) -> Self {
        Self {
            scripts,
            project: RwLock::new(IndexMap::new()),
        }
    }

    #[must_use]
    pub fn scripts(&self) -> &Arc<dyn ScriptCache> {
        &self.scripts
    }

    /// Replace the project source overrides. Sources without a usable name
    /// are skipped.
    pub fn set_project_sources(&self, sources: Vec<Source>) {
        let mut project = self.project.write();
        project.clear();
        for mut source in sources {
            let Some(name) = source_script_name(&source) else {
                tracing::warn!(?source, "ignoring project source without a name");
                continue;
            };
            let reference = SourceRef::from_script_name(&name);
            source.source_reference = Some(reference.get());
            project.insert(reference, source);
        }
        tracing::debug!(count = project.len(), "project sources recorded");
    }

    #[must_use]
    pub fn project_source(&self, reference: SourceRef) -> Option<Source> {
        self.project.read().get(&reference).cloned()
    }

    #[must_use]
    pub fn project_sources(&self) -> Vec<Source> {
        self.project.read().values().cloned().collect()
    }

    /// Source for a script, preferring the project override.
    #[must_use]
    pub fn source_for_script(&self, script: &str) -> Option<Source> {
        let reference = SourceRef::from_script_name(script);
        if let Some(source) = self.project_source(reference) {
            return Some(source);
        }
        let metadata = self.scripts.source_metadata(script)?;
        Some(Source {
            name: Some(metadata.name.to_string()),
            path: metadata.path.map(|path| path.to_string_lossy().into_owned()),
            source_reference: Some(reference.get()),
            modified_time: metadata.modified_time,
        })
    }

    /// Script name behind a source reference, searched among the project
    /// sources and then `loaded`.
    #[must_use]
    pub fn script_for_reference(&self, reference: u32, loaded: &[SmolStr]) -> Option<SmolStr> {
        if reference == 0 {
            return None;
        }
        if let Some(name) = self
            .project
            .read()
            .iter()
            .find(|(key, _)| key.get() == reference)
            .and_then(|(_, source)| source_script_name(source))
        {
            return Some(name);
        }
        loaded
            .iter()
            .find(|name| SourceRef::from_script_name(name).get() == reference)
            .map(|name| normalize_script_name(name))
    }

    pub fn clear(&self) {
        self.project.write().clear();
    }
}

impl std::fmt::Debug for SourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCatalog")
            .field("project", &self.project.read().len())
            .finish_non_exhaustive()
    }
}

/// Normalized script name for a protocol source: its `name`, else the file
/// name of its `path`.
#[must_use]
pub fn source_script_name(source: &Source) -> Option<SmolStr> {
    let raw = source
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            source
                .path
                .as_deref()
                .and_then(|path| Path::new(path).file_name())
                .and_then(|name| name.to_str())
        })?;
    let normalized = normalize_script_name(raw);
    (!normalized.is_empty()).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_runtime::harness::MemoryScriptCache;

    fn catalog() -> (Arc<MemoryScriptCache>, SourceCatalog) {
        let scripts = Arc::new(MemoryScriptCache::new());
        scripts.insert_lines("Quest", &[12]);
        scripts.set_source_file("Quest", "D:/Scripts/Source/Quest.psc", 100);
        let catalog = SourceCatalog::new(scripts.clone());
        (scripts, catalog)
    }

    #[test]
    fn script_name_falls_back_to_path() {
        let source = Source {
            path: Some("/mods/Scripts/Source/MyQuest.psc".into()),
            ..Source::default()
        };
        assert_eq!(source_script_name(&source).as_deref(), Some("myquest"));

        let blank = Source {
            name: Some("  ".into()),
            path: Some("/mods/Other.psc".into()),
            ..Source::default()
        };
        assert_eq!(source_script_name(&blank).as_deref(), Some("other"));
        assert_eq!(source_script_name(&Source::default()), None);
    }

    #[test]
    fn project_sources_win_over_cache_metadata() {
        let (_, catalog) = catalog();
        let from_cache = catalog.source_for_script("Quest").unwrap();
        assert_eq!(from_cache.modified_time, Some(100));
        assert_eq!(from_cache.name.as_deref(), Some("Quest.psc"));

        catalog.set_project_sources(vec![Source {
            name: Some("Quest.psc".into()),
            path: Some("C:/project/Quest.psc".into()),
            source_reference: None,
            modified_time: Some(50),
        }]);
        let project = catalog.source_for_script("quest").unwrap();
        assert_eq!(project.path.as_deref(), Some("C:/project/Quest.psc"));
        assert_eq!(
            project.source_reference,
            Some(SourceRef::from_script_name("Quest").get())
        );
    }

    #[test]
    fn references_resolve_through_loaded_scripts() {
        let (_, catalog) = catalog();
        let reference = SourceRef::from_script_name("Quest").get();
        let loaded = vec![SmolStr::new("Actor"), SmolStr::new("Quest")];
        assert_eq!(
            catalog.script_for_reference(reference, &loaded).as_deref(),
            Some("quest")
        );
        assert_eq!(catalog.script_for_reference(0, &loaded), None);
        assert_eq!(catalog.script_for_reference(reference, &[]), None);
    }
}

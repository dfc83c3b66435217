//! Debug server configuration loading.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;
use smol_str::SmolStr;

use papyrus_runtime::Game;

pub const ENV_PROTOCOL_LOG: &str = "PAPYRUS_DEBUG_DAP_LOG";
pub const ENV_VERBOSE: &str = "PAPYRUS_DEBUG_DAP_VERBOSE";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugServerConfig {
    pub game: Game,
    pub log_level: SmolStr,
    /// Raw protocol transcript destination.
    pub protocol_log: Option<PathBuf>,
    /// Echo protocol traffic to the client console.
    pub verbose: bool,
}

impl Default for DebugServerConfig {
    fn default() -> Self {
        Self {
            game: Game::default(),
            log_level: SmolStr::new_static("info"),
            protocol_log: None,
            verbose: false,
        }
    }
}

impl DebugServerConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let raw: ConfigToml = toml::from_str(text).context("failed to parse TOML")?;
        raw.into_config()
    }

    /// Apply `PAPYRUS_DEBUG_DAP_LOG` / `PAPYRUS_DEBUG_DAP_VERBOSE`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(ENV_PROTOCOL_LOG) {
            if !path.is_empty() {
                self.protocol_log = Some(PathBuf::from(path));
            }
        }
        if env_flag(ENV_VERBOSE) {
            self.verbose = true;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    game: Option<Game>,
    log: Option<LogSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
    protocol_log: Option<PathBuf>,
    verbose: Option<bool>,
}

impl ConfigToml {
    fn into_config(self) -> anyhow::Result<DebugServerConfig> {
        let defaults = DebugServerConfig::default();
        let log = self.log.unwrap_or_default();
        let log_level = match log.level {
            Some(level) => {
                let level = level.trim().to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    bail!("invalid log.level '{level}'");
                }
                SmolStr::new(level)
            }
            None => defaults.log_level,
        };
        Ok(DebugServerConfig {
            game: self.game.unwrap_or(defaults.game),
            log_level,
            protocol_log: log.protocol_log,
            verbose: log.verbose.unwrap_or(defaults.verbose),
        })
    }
}

pub(crate) fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            matches!(value.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}

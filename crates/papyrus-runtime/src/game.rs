//! Target game flavour.

use serde::Deserialize;

/// Game hosting the Papyrus VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    /// Skyrim (Special/Anniversary Edition).
    #[default]
    Skyrim,
    /// Fallout 4.
    #[serde(alias = "fallout")]
    Fallout4,
}

impl Game {
    /// INI file that carries the `[Papyrus]` debug-information switch.
    #[must_use]
    pub fn ini_name(self) -> &'static str {
        match self {
            Game::Skyrim => "skyrim.ini",
            Game::Fallout4 => "fallout4.ini",
        }
    }
}

//! Persisted user selection. Saved on every control change and restored at
//! startup, so the app comes back with the last mode, sliders and timer.

use crate::mode::SoundMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Preferences {
    #[serde(default = "default_mode")]
    pub mode: SoundMode,
    /// 0..100 slider position.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// 0..100 slider position.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Sleep timer selection; `None` means play until stopped.
    #[serde(default)]
    pub timer_minutes: Option<u32>,
}

fn default_mode() -> SoundMode {
    SoundMode::White
}

fn default_intensity() -> f32 {
    50.0
}

fn default_volume() -> f32 {
    60.0
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            intensity: default_intensity(),
            volume: default_volume(),
            timer_minutes: None,
        }
    }
}

impl Preferences {
    /// Load from a TOML file; a missing or unreadable file yields defaults,
    /// a malformed one is reported.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = match std::fs::read_to_string(path) {
            Ok(txt) => txt,
            Err(_) => return Ok(Self::default()),
        };
        let mut prefs: Preferences =
            toml::from_str(&txt).with_context(|| format!("malformed {}", path.display()))?;
        prefs.intensity = prefs.intensity.clamp(0.0, 100.0);
        prefs.volume = prefs.volume.clamp(0.0, 100.0);
        Ok(prefs)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let txt = toml::to_string_pretty(self).context("serialize preferences")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(path, txt).with_context(|| format!("write {}", path.display()))
    }
}

use crate::noise::NoiseColor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selected noise character. Synthetic modes run the colored noise generator
/// through the preset filter pair; `*Real` modes loop a decoded recording
/// straight into the master gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundMode {
    White,
    Pink,
    Brown,
    Waterfall,
    Rain,
    Wind,
    Fan,
    Vacuum,
    WaterfallReal,
    SeaReal,
}

pub const ALL_MODES: [SoundMode; 10] = [
    SoundMode::White,
    SoundMode::Pink,
    SoundMode::Brown,
    SoundMode::Waterfall,
    SoundMode::Rain,
    SoundMode::Wind,
    SoundMode::Fan,
    SoundMode::Vacuum,
    SoundMode::WaterfallReal,
    SoundMode::SeaReal,
];

pub const SYNTH_MODES: [SoundMode; 8] = [
    SoundMode::White,
    SoundMode::Pink,
    SoundMode::Brown,
    SoundMode::Waterfall,
    SoundMode::Rain,
    SoundMode::Wind,
    SoundMode::Fan,
    SoundMode::Vacuum,
];

impl SoundMode {
    pub fn is_real(self) -> bool {
        self.asset_name().is_some()
    }

    /// Asset key for real-recording modes, `None` for synthetic ones.
    pub fn asset_name(self) -> Option<&'static str> {
        match self {
            SoundMode::WaterfallReal => Some("waterfall"),
            SoundMode::SeaReal => Some("sea"),
            _ => None,
        }
    }

    /// Base generator color feeding the preset filters. Presets lean on pink
    /// or brown where the shaped result should stay smooth, white where the
    /// mode needs hiss to carve from. Real modes have no generator.
    pub fn base_color(self) -> Option<NoiseColor> {
        match self {
            SoundMode::White | SoundMode::Rain | SoundMode::Vacuum => Some(NoiseColor::White),
            SoundMode::Pink | SoundMode::Waterfall | SoundMode::Wind => Some(NoiseColor::Pink),
            SoundMode::Brown | SoundMode::Fan => Some(NoiseColor::Brown),
            SoundMode::WaterfallReal | SoundMode::SeaReal => None,
        }
    }

    /// Synthetic stand-in used when a real recording fails to load so playback
    /// can still proceed.
    pub fn fallback(self) -> SoundMode {
        match self {
            SoundMode::WaterfallReal => SoundMode::Waterfall,
            SoundMode::SeaReal => SoundMode::Wind,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SoundMode::White => "white",
            SoundMode::Pink => "pink",
            SoundMode::Brown => "brown",
            SoundMode::Waterfall => "waterfall",
            SoundMode::Rain => "rain",
            SoundMode::Wind => "wind",
            SoundMode::Fan => "fan",
            SoundMode::Vacuum => "vacuum",
            SoundMode::WaterfallReal => "waterfall_real",
            SoundMode::SeaReal => "sea_real",
        }
    }
}

impl fmt::Display for SoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_MODES
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown sound mode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_str() {
        for mode in ALL_MODES {
            assert_eq!(mode.as_str().parse::<SoundMode>().unwrap(), mode);
        }
    }

    #[test]
    fn real_modes_have_assets_and_synth_fallbacks() {
        for mode in ALL_MODES {
            if mode.is_real() {
                assert!(mode.asset_name().is_some());
                assert!(mode.base_color().is_none());
                assert!(!mode.fallback().is_real());
            } else {
                assert!(mode.base_color().is_some());
                assert_eq!(mode.fallback(), mode);
            }
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("grey".parse::<SoundMode>().is_err());
    }
}

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendConfig {
    /// Directory searched for real-recording assets (mp3/wav).
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Exponent of the perceptual volume curve (slider fraction ^ exponent).
    #[serde(default = "default_volume_exponent")]
    pub volume_exponent: f32,
    #[serde(default = "default_start_ramp_ms")]
    pub start_ramp_ms: f32,
    #[serde(default = "default_swap_fade_ms")]
    pub swap_fade_ms: f32,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_volume_exponent() -> f32 {
    1.6
}

fn default_start_ramp_ms() -> f32 {
    80.0
}

fn default_swap_fade_ms() -> f32 {
    8.0
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            output_dir: default_output_dir(),
            volume_exponent: default_volume_exponent(),
            start_ramp_ms: default_start_ramp_ms(),
            swap_fade_ms: default_swap_fade_ms(),
        }
    }
}

impl BackendConfig {
    /// Write the configuration as TOML to the provided path
    pub fn write_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, toml_str)
    }

    /// Generate a default configuration file at the given path
    pub fn generate_default<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<()> {
        Self::default().write_to_file(path)
    }
}

pub static CONFIG: Lazy<BackendConfig> = Lazy::new(|| {
    let path = PathBuf::from("config.toml");
    if let Ok(txt) = std::fs::read_to_string(&path) {
        toml::from_str(&txt).unwrap_or_default()
    } else {
        BackendConfig::default()
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: BackendConfig = toml::from_str("asset_dir = \"sounds\"").unwrap();
        assert_eq!(cfg.asset_dir, PathBuf::from("sounds"));
        assert!((cfg.volume_exponent - 1.6).abs() < f32::EPSILON);
        assert!((cfg.start_ramp_ms - 80.0).abs() < f32::EPSILON);
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = BackendConfig::default();
        cfg.volume_exponent = 2.0;
        cfg.write_to_file(&path).unwrap();
        let loaded: BackendConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!((loaded.volume_exponent - 2.0).abs() < f32::EPSILON);
        assert_eq!(loaded.asset_dir, cfg.asset_dir);
    }
}

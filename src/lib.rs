//! Ambient noise generator backend.
//!
//! The control half builds filtered-noise or looped-recording chains and
//! pushes them to the render half over a lock-free command queue; the
//! render half owns at most one chain at a time and handles every gain
//! ramp. See [`engine::NoiseEngine`] for the user-facing surface and
//! [`player::Player`] for the audio-callback side.

pub mod assets;
pub mod audio_io;
pub mod chain;
pub mod command;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod logging;
pub mod mode;
pub mod noise;
pub mod player;
pub mod prefs;
pub mod presets;

pub use assets::{AssetStore, AudioAsset};
pub use chain::NoiseChain;
pub use command::Command;
pub use engine::{EngineStatus, NoiseEngine};
pub use mode::SoundMode;
pub use player::Player;

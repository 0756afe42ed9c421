//! Control-thread facade over the playback graph.
//!
//! The engine owns the command producer and the user-facing selection
//! (mode, intensity, volume). It builds [`NoiseChain`] objects off the
//! render thread, pushes them through the ring buffer, and resolves
//! real-recording modes through the asset store, falling back to a
//! synthesized approximation when a recording cannot be loaded.

use crate::assets::{AssetResult, AssetStore};
use crate::chain::NoiseChain;
use crate::command::Command;
use crate::config::CONFIG;
use crate::mode::SoundMode;
use crate::presets::chain_config;
use parking_lot::Mutex;
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const COMMAND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    /// Waiting for a recording to decode before the chain can start.
    Loading(SoundMode),
    Playing(SoundMode),
}

pub type StatusCallback = Box<dyn Fn(EngineStatus) + Send + Sync>;

struct Selection {
    mode: SoundMode,
    /// Normalized 0..1.
    intensity: f32,
    /// Normalized 0..1 slider fraction, before the perceptual curve.
    volume: f32,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            mode: SoundMode::White,
            intensity: 0.5,
            volume: 0.6,
        }
    }
}

pub struct NoiseEngine {
    store: Arc<AssetStore>,
    producer: Mutex<Option<HeapProd<Command>>>,
    selection: Mutex<Selection>,
    status: Mutex<EngineStatus>,
    on_status: Mutex<Option<StatusCallback>>,
    is_playing: Arc<AtomicBool>,
    sample_rate: f32,
    /// Bumped on every start/stop/mode change; an asset callback whose
    /// generation no longer matches belongs to an abandoned request.
    generation: AtomicU64,
}

impl NoiseEngine {
    pub fn new(store: Arc<AssetStore>, sample_rate: f32) -> Arc<Self> {
        Arc::new(Self {
            store,
            producer: Mutex::new(None),
            selection: Mutex::new(Selection::default()),
            status: Mutex::new(EngineStatus::Idle),
            on_status: Mutex::new(None),
            is_playing: Arc::new(AtomicBool::new(false)),
            sample_rate,
            generation: AtomicU64::new(0),
        })
    }

    /// Create the command queue and hand back its consumer for the render
    /// half. Replaces any previous queue.
    pub fn connect(&self) -> HeapCons<Command> {
        let rb = HeapRb::<Command>::new(COMMAND_QUEUE_CAPACITY);
        let (prod, cons) = rb.split();
        *self.producer.lock() = Some(prod);
        cons
    }

    /// Flag shared with the render half; [`crate::player::Player`] keeps it
    /// in sync with whether a chain is connected.
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.is_playing)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn asset_store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub fn on_status(&self, callback: impl Fn(EngineStatus) + Send + Sync + 'static) {
        *self.on_status.lock() = Some(Box::new(callback));
    }

    pub fn mode(&self) -> SoundMode {
        self.selection.lock().mode
    }

    pub fn intensity_percent(&self) -> f32 {
        self.selection.lock().intensity * 100.0
    }

    pub fn volume_percent(&self) -> f32 {
        self.selection.lock().volume * 100.0
    }

    fn set_status(&self, status: EngineStatus) {
        *self.status.lock() = status;
        if let Some(cb) = self.on_status.lock().as_ref() {
            cb(status);
        }
    }

    fn push(&self, cmd: Command) {
        let mut guard = self.producer.lock();
        match guard.as_mut() {
            Some(prod) => {
                if prod.try_push(cmd).is_err() {
                    log::warn!("command queue full, dropping command");
                }
            }
            None => log::debug!("no render half connected, dropping command"),
        }
    }

    /// Select a mode. If audio is running the chain is rebuilt and swapped
    /// in; otherwise only the selection changes.
    pub fn set_mode(self: &Arc<Self>, mode: SoundMode) {
        let active = {
            let mut sel = self.selection.lock();
            if sel.mode == mode {
                return;
            }
            sel.mode = mode;
            // A load in flight counts as active; the new mode supersedes it.
            self.is_playing() || self.status() != EngineStatus::Idle
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        if active {
            self.start();
        }
    }

    /// Intensity slider, 0..100. Synthesized chains retune in place; real
    /// recordings have no tunable stages and ignore it.
    pub fn set_intensity(&self, percent: f32) {
        let (mode, intensity) = {
            let mut sel = self.selection.lock();
            sel.intensity = (percent / 100.0).clamp(0.0, 1.0);
            (sel.mode, sel.intensity)
        };
        if self.is_playing() {
            if let Some(config) = chain_config(mode, intensity) {
                self.push(Command::Retune(config));
            }
        }
    }

    /// Volume slider, 0..100, mapped through the perceptual curve before it
    /// reaches the gain stage.
    pub fn set_volume(&self, percent: f32) {
        let fraction = (percent / 100.0).clamp(0.0, 1.0);
        self.selection.lock().volume = fraction;
        self.push(Command::SetGain(fraction.powf(CONFIG.volume_exponent)));
    }

    pub fn toggle_play(self: &Arc<Self>) {
        if self.is_playing() || matches!(self.status(), EngineStatus::Loading(_)) {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Build and install a chain for the current selection. Synthesized
    /// modes start immediately; real modes start once their recording is
    /// decoded, or fall back to a synthesized stand-in on failure.
    pub fn start(self: &Arc<Self>) {
        let (mode, intensity, volume) = {
            let sel = self.selection.lock();
            (sel.mode, sel.intensity, sel.volume)
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.push(Command::SetGain(volume.powf(CONFIG.volume_exponent)));

        match mode.asset_name() {
            None => self.start_synth(mode, intensity),
            Some(name) => {
                if let Some(asset) = self.store.cached(name) {
                    self.install_real(mode, asset);
                    return;
                }
                self.set_status(EngineStatus::Loading(mode));
                let engine = Arc::clone(self);
                self.store.fetch(name, move |result: AssetResult| {
                    if engine.generation.load(Ordering::SeqCst) != generation {
                        log::debug!("discarding stale asset load for {mode}");
                        return;
                    }
                    match result {
                        Ok(asset) => engine.install_real(mode, asset),
                        Err(err) => {
                            let fallback = mode.fallback();
                            log::warn!("loading {mode} failed ({err}), using {fallback}");
                            let intensity = engine.selection.lock().intensity;
                            engine.start_synth(fallback, intensity);
                        }
                    }
                });
            }
        }
    }

    fn start_synth(&self, mode: SoundMode, intensity: f32) {
        if let Some(config) = chain_config(mode, intensity) {
            let chain = NoiseChain::synth(config, self.sample_rate);
            self.push(Command::ReplaceChain(chain));
            self.set_status(EngineStatus::Playing(mode));
        } else {
            log::error!("no synthesis preset for {mode}");
            self.set_status(EngineStatus::Idle);
        }
    }

    fn install_real(&self, mode: SoundMode, asset: Arc<crate::assets::AudioAsset>) {
        let chain = NoiseChain::real(mode, asset, self.sample_rate);
        self.push(Command::ReplaceChain(chain));
        self.set_status(EngineStatus::Playing(mode));
    }

    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.push(Command::Stop);
        self.set_status(EngineStatus::Idle);
    }

    /// Sleep-timer expiry: ramp to silence instead of cutting.
    pub fn fade_out(&self, seconds: f32) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.push(Command::FadeOut(seconds.max(0.01)));
        self.set_status(EngineStatus::Idle);
    }
}

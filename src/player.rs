//! Render-thread half of the playback graph manager.
//!
//! The player owns at most one live [`NoiseChain`] and the master gain
//! stage. Chain swaps are atomic from the listener's point of view: the
//! output is first ramped to silence, the old chain is dropped and the new
//! one installed at the zero crossing, then gain ramps back in. Two chains
//! are never audible at once.

use crate::chain::NoiseChain;
use crate::command::Command;
use crate::config::CONFIG;
use crate::mode::SoundMode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-pole smoothing time constant for volume slider moves.
const GAIN_SMOOTH_SECONDS: f32 = 0.015;

pub struct Player {
    sample_rate: f32,
    chain: Option<NoiseChain>,
    /// Built replacement waiting for the output to reach silence. Never
    /// processed while it waits, so the at-most-one-chain invariant holds
    /// even mid-swap.
    pending: Option<NoiseChain>,
    /// Smoothed master gain and its target (volume-curve domain).
    gain: f32,
    gain_target: f32,
    gain_coeff: f32,
    /// Structural envelope: 0 at silence, 1 at full output. Drives the
    /// start ramp, swap mute and fade-out independently of volume.
    env: f32,
    env_target: f32,
    env_rise: f32,
    env_fall: f32,
    /// Overrides `env_fall` during a timed fade-out; reaching silence then
    /// tears the chain down.
    fade_step: Option<f32>,
    is_playing: Arc<AtomicBool>,
}

impl Player {
    pub fn new(sample_rate: f32, is_playing: Arc<AtomicBool>) -> Self {
        Self {
            sample_rate,
            chain: None,
            pending: None,
            gain: 0.0,
            gain_target: 0.0,
            gain_coeff: 1.0 - (-1.0 / (sample_rate * GAIN_SMOOTH_SECONDS)).exp(),
            env: 0.0,
            env_target: 0.0,
            env_rise: 1.0 / (sample_rate * CONFIG.start_ramp_ms.max(1.0) / 1000.0),
            env_fall: 1.0 / (sample_rate * CONFIG.swap_fade_ms.max(1.0) / 1000.0),
            fade_step: None,
            is_playing,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    pub fn chain_mode(&self) -> Option<SoundMode> {
        self.chain.as_ref().map(|c| c.mode())
    }

    /// Effective master gain right now (volume x envelope, without the
    /// per-frame modulation offset).
    pub fn master_gain(&self) -> f32 {
        self.gain * self.env
    }

    pub fn volume_gain(&self) -> f32 {
        self.gain
    }

    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ReplaceChain(chain) => {
                self.fade_step = None;
                if self.chain.is_none() {
                    self.install(chain);
                } else {
                    // A superseded pending chain is simply dropped; the last
                    // request wins.
                    self.pending = Some(chain);
                    self.env_target = 0.0;
                }
                self.is_playing.store(true, Ordering::Relaxed);
            }
            Command::Retune(config) => {
                if let Some(chain) = &mut self.chain {
                    if chain.mode() == config.mode {
                        chain.retune(&config);
                    }
                }
                if let Some(pending) = &mut self.pending {
                    if pending.mode() == config.mode {
                        pending.retune(&config);
                    }
                }
            }
            Command::SetGain(gain) => {
                self.gain_target = gain.clamp(0.0, 1.0);
            }
            Command::FadeOut(seconds) => {
                if self.chain.is_some() {
                    // The fade supersedes any swap still waiting for silence.
                    self.pending = None;
                    let samples = (seconds * self.sample_rate).max(1.0);
                    self.fade_step = Some(1.0 / samples);
                    self.env_target = 0.0;
                }
            }
            Command::Stop => self.teardown(),
        }
    }

    fn install(&mut self, chain: NoiseChain) {
        self.chain = Some(chain);
        self.env = 0.0;
        self.env_target = 1.0;
    }

    /// Total-effort teardown: cancel every ramp, hard-set gain to zero and
    /// release both the live and any pending chain. Safe to call in any
    /// state; calling it twice is a no-op.
    fn teardown(&mut self) {
        self.chain = None;
        self.pending = None;
        self.env = 0.0;
        self.env_target = 0.0;
        self.gain = 0.0;
        self.fade_step = None;
        self.is_playing.store(false, Ordering::Relaxed);
    }

    /// Render one block of interleaved stereo. No allocation, no locks.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        buffer.fill(0.0);
        let frames = buffer.len() / 2;

        for i in 0..frames {
            // Structural envelope first: a swap or fade may only complete at
            // silence, and the swap installs the pending chain before any
            // sample of this frame is produced.
            if self.env > self.env_target {
                let step = self.fade_step.unwrap_or(self.env_fall);
                self.env = (self.env - step).max(self.env_target);
            } else if self.env < self.env_target {
                self.env = (self.env + self.env_rise).min(self.env_target);
            }

            if self.env <= 0.0 {
                // A completed fade wins over a queued swap.
                if self.fade_step.is_some() {
                    self.teardown();
                } else if let Some(next) = self.pending.take() {
                    self.install(next);
                }
            }

            let Some(chain) = &mut self.chain else {
                // Remainder of the block stays silent.
                break;
            };

            self.gain += (self.gain_target - self.gain) * self.gain_coeff;

            let frame = chain.tick();
            // Modulation is additive on the gain value; the clamp keeps the
            // sum from going negative or past unity.
            let g = (self.gain + frame.gain_offset).clamp(0.0, 1.0) * self.env;
            buffer[i * 2] = frame.left * g;
            buffer[i * 2 + 1] = frame.right * g;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AudioAsset;
    use crate::presets::chain_config;

    const RATE: f32 = 44_100.0;

    fn player() -> (Player, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Player::new(RATE, Arc::clone(&flag)), flag)
    }

    fn synth_chain(mode: SoundMode, intensity: f32) -> NoiseChain {
        NoiseChain::synth_seeded(chain_config(mode, intensity).unwrap(), RATE, 9)
    }

    fn real_chain() -> NoiseChain {
        let asset = Arc::new(AudioAsset::from_samples(vec![0.5; 44_100 * 2], 44_100));
        NoiseChain::real(SoundMode::WaterfallReal, asset, RATE)
    }

    fn run_blocks(p: &mut Player, blocks: usize) -> f32 {
        let mut buf = vec![0.0f32; 512 * 2];
        let mut peak = 0.0f32;
        for _ in 0..blocks {
            p.process_block(&mut buf);
            for s in &buf {
                peak = peak.max(s.abs());
            }
        }
        peak
    }

    #[test]
    fn idle_player_renders_silence() {
        let (mut p, flag) = player();
        assert_eq!(run_blocks(&mut p, 4), 0.0);
        assert!(!flag.load(Ordering::Relaxed));
        assert_eq!(p.master_gain(), 0.0);
    }

    #[test]
    fn install_then_stop_leaves_nothing_connected() {
        for mode in crate::mode::SYNTH_MODES {
            for intensity in [0.0, 0.5, 1.0] {
                let (mut p, flag) = player();
                p.handle_command(Command::SetGain(0.7));
                p.handle_command(Command::ReplaceChain(synth_chain(mode, intensity)));
                assert!(run_blocks(&mut p, 20) > 0.0);
                assert!(flag.load(Ordering::Relaxed));

                p.handle_command(Command::Stop);
                assert!(!p.has_chain());
                assert_eq!(p.master_gain(), 0.0);
                assert!(!flag.load(Ordering::Relaxed));
                assert_eq!(run_blocks(&mut p, 4), 0.0);
            }
        }
    }

    #[test]
    fn stop_is_idempotent_from_any_state() {
        let (mut p, flag) = player();
        // Already stopped.
        p.handle_command(Command::Stop);
        assert_eq!(p.master_gain(), 0.0);

        // Mid ramp-in.
        p.handle_command(Command::SetGain(1.0));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        let mut buf = vec![0.0f32; 64];
        p.process_block(&mut buf);
        p.handle_command(Command::Stop);
        p.handle_command(Command::Stop);
        assert!(!p.has_chain());
        assert_eq!(p.master_gain(), 0.0);
        assert!(!flag.load(Ordering::Relaxed));

        // Mid fade-out.
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Wind, 0.3)));
        run_blocks(&mut p, 10);
        p.handle_command(Command::FadeOut(2.0));
        run_blocks(&mut p, 2);
        p.handle_command(Command::Stop);
        assert!(!p.has_chain());
        assert_eq!(run_blocks(&mut p, 2), 0.0);
    }

    #[test]
    fn output_ramps_in_from_silence() {
        let (mut p, _) = player();
        p.handle_command(Command::SetGain(1.0));
        p.handle_command(Command::ReplaceChain(real_chain()));
        let mut buf = vec![0.0f32; 32 * 2];
        p.process_block(&mut buf);
        // First frames of the ramp must be near-silent.
        assert!(buf[0].abs() < 0.01);
        // After the 80 ms ramp the clip's 0.5 level is audible.
        let peak = run_blocks(&mut p, 40);
        assert!(peak > 0.3);
    }

    #[test]
    fn volume_target_follows_perceptual_curve_scenario() {
        // start(white, 0.5) at volume 80: master gain settles at 0.8^1.6.
        let (mut p, _) = player();
        let target = 0.8f32.powf(1.6);
        p.handle_command(Command::SetGain(target));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        run_blocks(&mut p, 100); // ~1.2 s, well past both ramps
        assert!((p.volume_gain() - target).abs() < 1e-3);
        assert!((p.master_gain() - target).abs() < 1e-3);
    }

    #[test]
    fn replace_never_runs_two_chains() {
        let (mut p, _) = player();
        p.handle_command(Command::SetGain(0.9));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        run_blocks(&mut p, 20);
        assert_eq!(p.chain_mode(), Some(SoundMode::White));

        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Fan, 0.5)));
        // The old chain keeps the slot until the mute completes; the pending
        // one is invisible to the output.
        assert_eq!(p.chain_mode(), Some(SoundMode::White));
        let mut buf = vec![0.0f32; 64 * 2];
        let mut saw_swap = false;
        for _ in 0..50 {
            p.process_block(&mut buf);
            match p.chain_mode() {
                Some(SoundMode::White) | Some(SoundMode::Fan) => {}
                other => panic!("unexpected chain state during swap: {other:?}"),
            }
            if p.chain_mode() == Some(SoundMode::Fan) {
                saw_swap = true;
                break;
            }
        }
        assert!(saw_swap, "swap never completed");
    }

    #[test]
    fn superseded_pending_chain_is_dropped() {
        let (mut p, _) = player();
        p.handle_command(Command::SetGain(0.9));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        run_blocks(&mut p, 20);
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Fan, 0.5)));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Rain, 0.5)));
        run_blocks(&mut p, 50);
        assert_eq!(p.chain_mode(), Some(SoundMode::Rain));
    }

    #[test]
    fn rapid_start_stop_start_resolves_to_last_action() {
        let (mut p, flag) = player();
        p.handle_command(Command::SetGain(0.8));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        p.handle_command(Command::Stop);
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Rain, 0.5)));
        let peak = run_blocks(&mut p, 40);
        assert_eq!(p.chain_mode(), Some(SoundMode::Rain));
        assert!(flag.load(Ordering::Relaxed));
        assert!(peak > 0.0);
    }

    #[test]
    fn fade_out_completes_to_idle() {
        let (mut p, flag) = player();
        p.handle_command(Command::SetGain(0.8));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Brown, 0.5)));
        run_blocks(&mut p, 20);
        p.handle_command(Command::FadeOut(0.05));
        run_blocks(&mut p, 20);
        assert!(!p.has_chain());
        assert_eq!(p.master_gain(), 0.0);
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn fade_out_during_pending_swap_discards_the_replacement() {
        let (mut p, flag) = player();
        p.handle_command(Command::SetGain(0.8));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::White, 0.5)));
        run_blocks(&mut p, 20);
        // Swap queued behind the mute, then a fade-out before it lands: the
        // fade is the last word, the queued chain never plays.
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Fan, 0.5)));
        p.handle_command(Command::FadeOut(0.05));
        run_blocks(&mut p, 120); // ~1.4 s, far past both the fade and the ramps
        assert!(!p.has_chain());
        assert_eq!(p.chain_mode(), None);
        assert_eq!(p.master_gain(), 0.0);
        assert!(!flag.load(Ordering::Relaxed));
        assert_eq!(run_blocks(&mut p, 4), 0.0);
    }

    #[test]
    fn retune_targets_matching_chain_only() {
        let (mut p, _) = player();
        p.handle_command(Command::SetGain(0.8));
        p.handle_command(Command::ReplaceChain(synth_chain(SoundMode::Wind, 0.2)));
        run_blocks(&mut p, 5);
        p.handle_command(Command::Retune(chain_config(SoundMode::Wind, 0.9).unwrap()));
        run_blocks(&mut p, 5);
        assert_eq!(p.chain_mode(), Some(SoundMode::Wind));

        // Mismatched mode is ignored.
        p.handle_command(Command::Retune(chain_config(SoundMode::Fan, 0.1).unwrap()));
        assert_eq!(p.chain_mode(), Some(SoundMode::Wind));
    }
}

//! The live processing graph for one playing session:
//! source -> shaping filter x2 -> modulated master gain (applied by the
//! player). Real-recording chains are just source -> master gain; they carry
//! no filters and no modulation, the recording plays back uncolored.

use crate::assets::AudioAsset;
use crate::dsp::trig;
use crate::mode::SoundMode;
use crate::noise::ColoredNoise;
use crate::presets::ChainConfig;
use biquad::{Biquad, DirectForm2Transposed};
use std::sync::Arc;

const TWO_PI: f32 = std::f32::consts::PI * 2.0;

/// Slow sine oscillator adding small movement to the master gain. The offset
/// it produces is summed onto the gain value, never multiplied, and depths
/// are small enough that the clamped sum stays in [0, 1].
pub struct Lfo {
    freq: f32,
    depth: f32,
    phase: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(freq: f32, depth: f32, sample_rate: f32) -> Self {
        Self {
            freq,
            depth,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Update rate and depth without resetting phase, so a retune does not
    /// produce a jump in the modulation curve.
    pub fn set(&mut self, freq: f32, depth: f32) {
        self.freq = freq;
        self.depth = depth;
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let v = trig::sin_lut(self.phase) * self.depth;
        self.phase += TWO_PI * self.freq / self.sample_rate;
        if self.phase >= TWO_PI {
            self.phase -= TWO_PI;
        }
        v
    }
}

// Loop-point trim for real recordings: skip the encoder lead-in and the
// decoder tail padding so the wrap lands on steady material.
const LOOP_LEAD_SECONDS: f32 = 0.045;
const LOOP_TAIL_SECONDS: f32 = 0.120;
const MIN_ASSET_SECONDS: f32 = 0.5;
const MIN_LOOP_SECONDS: f32 = 0.4;

/// Loop window (start, end) in frames, strictly inside [0, frames]. Falls
/// back to the full asset when the trimmed window would be too short.
pub fn loop_bounds(frames: usize, sample_rate: u32) -> (usize, usize) {
    let rate = sample_rate as f32;
    let duration = frames as f32 / rate;
    let lead = (LOOP_LEAD_SECONDS * rate) as usize;
    let tail = (LOOP_TAIL_SECONDS * rate) as usize;
    if duration < MIN_ASSET_SECONDS || frames <= lead + tail {
        return (0, frames);
    }
    let start = lead;
    let end = frames - tail;
    if (end - start) as f32 / rate < MIN_LOOP_SECONDS {
        return (0, frames);
    }
    (start, end)
}

/// Looped playback of a decoded recording, stereo interleaved.
pub struct LoopingClip {
    asset: Arc<AudioAsset>,
    pos: usize,
    loop_start: usize,
    loop_end: usize,
}

impl LoopingClip {
    pub fn new(asset: Arc<AudioAsset>) -> Self {
        let (loop_start, loop_end) = loop_bounds(asset.frames(), asset.sample_rate());
        Self {
            asset,
            pos: loop_start,
            loop_start,
            loop_end,
        }
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        if self.pos >= self.loop_end {
            self.pos = self.loop_start;
        }
        let samples = self.asset.samples();
        let idx = self.pos * 2;
        self.pos += 1;
        (samples[idx], samples[idx + 1])
    }
}

enum ChainSource {
    Synth(ColoredNoise),
    Real(LoopingClip),
}

/// One frame of chain output plus the additive gain offset contributed by the
/// modulation unit for that frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
    pub gain_offset: f32,
}

/// A fully wired processing graph. Exactly one chain may be installed in the
/// player at a time; dropping the chain tears the whole graph down.
pub struct NoiseChain {
    mode: SoundMode,
    intensity: f32,
    sample_rate: f32,
    source: ChainSource,
    filters: Option<[DirectForm2Transposed<f32>; 2]>,
    lfo: Option<Lfo>,
}

impl NoiseChain {
    pub fn synth(config: ChainConfig, sample_rate: f32) -> Self {
        Self::build_synth(config, sample_rate, None)
    }

    /// Deterministic generator seed, for offline rendering and tests.
    pub fn synth_seeded(config: ChainConfig, sample_rate: f32, seed: u64) -> Self {
        Self::build_synth(config, sample_rate, Some(seed))
    }

    fn build_synth(config: ChainConfig, sample_rate: f32, seed: Option<u64>) -> Self {
        let mut noise = match seed {
            Some(seed) => ColoredNoise::with_seed(config.color, seed),
            None => ColoredNoise::new(config.color),
        };
        noise.set_level(config.level);
        let filters = [
            DirectForm2Transposed::<f32>::new(config.stages[0].coefficients(sample_rate)),
            DirectForm2Transposed::<f32>::new(config.stages[1].coefficients(sample_rate)),
        ];
        Self {
            mode: config.mode,
            intensity: config.intensity,
            sample_rate,
            source: ChainSource::Synth(noise),
            filters: Some(filters),
            lfo: Some(Lfo::new(config.lfo_freq, config.lfo_depth, sample_rate)),
        }
    }

    pub fn real(mode: SoundMode, asset: Arc<AudioAsset>, sample_rate: f32) -> Self {
        debug_assert!(mode.is_real());
        Self {
            mode,
            intensity: 0.0,
            sample_rate,
            source: ChainSource::Real(LoopingClip::new(asset)),
            filters: None,
            lfo: None,
        }
    }

    pub fn mode(&self) -> SoundMode {
        self.mode
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn is_real(&self) -> bool {
        matches!(self.source, ChainSource::Real(_))
    }

    pub fn has_filters(&self) -> bool {
        self.filters.is_some()
    }

    pub fn has_modulation(&self) -> bool {
        self.lfo.is_some()
    }

    pub fn clip_bounds(&self) -> Option<(usize, usize)> {
        match &self.source {
            ChainSource::Real(clip) => Some(clip.bounds()),
            ChainSource::Synth(_) => None,
        }
    }

    /// In-place parameter update for intensity changes: new filter
    /// coefficients, modulation pair and generator drive, with filter state
    /// and LFO phase carried over so the transition is seamless. Returns
    /// false (and does nothing) for real-recording chains, where intensity
    /// is deliberately a no-op.
    pub fn retune(&mut self, config: &ChainConfig) -> bool {
        let ChainSource::Synth(noise) = &mut self.source else {
            return false;
        };
        debug_assert_eq!(config.mode, self.mode);
        noise.set_level(config.level);
        if let Some(filters) = &mut self.filters {
            filters[0].update_coefficients(config.stages[0].coefficients(self.sample_rate));
            filters[1].update_coefficients(config.stages[1].coefficients(self.sample_rate));
        }
        if let Some(lfo) = &mut self.lfo {
            lfo.set(config.lfo_freq, config.lfo_depth);
        }
        self.intensity = config.intensity;
        true
    }

    #[inline]
    pub fn tick(&mut self) -> Frame {
        match &mut self.source {
            ChainSource::Synth(noise) => {
                let mut s = noise.next();
                if let Some(filters) = &mut self.filters {
                    s = filters[0].run(s);
                    s = filters[1].run(s);
                }
                let gain_offset = self.lfo.as_mut().map(|l| l.next()).unwrap_or(0.0);
                Frame {
                    left: s,
                    right: s,
                    gain_offset,
                }
            }
            ChainSource::Real(clip) => {
                let (left, right) = clip.next_frame();
                Frame {
                    left,
                    right,
                    gain_offset: 0.0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::chain_config;

    fn asset_seconds(secs: f32, rate: u32) -> Arc<AudioAsset> {
        let frames = (secs * rate as f32) as usize;
        Arc::new(AudioAsset::from_samples(vec![0.5; frames * 2], rate))
    }

    #[test]
    fn loop_bounds_trim_lead_and_tail() {
        let rate = 44_100u32;
        let frames = rate as usize * 3;
        let (start, end) = loop_bounds(frames, rate);
        assert!(start > 0);
        assert!(end < frames);
        assert_eq!(start, (0.045 * rate as f32) as usize);
        assert_eq!(end, frames - (0.120 * rate as f32) as usize);
    }

    #[test]
    fn short_asset_loops_in_full() {
        let rate = 44_100u32;
        let frames = (0.3 * rate as f32) as usize;
        assert_eq!(loop_bounds(frames, rate), (0, frames));
        // Just over the duration floor but too short once trimmed.
        let frames = (0.52 * rate as f32) as usize;
        assert_eq!(loop_bounds(frames, rate), (0, frames));
    }

    #[test]
    fn clip_wraps_inside_bounds() {
        let asset = asset_seconds(1.0, 8_000);
        let mut clip = LoopingClip::new(Arc::clone(&asset));
        let (start, end) = clip.bounds();
        assert!(end <= asset.frames());
        for _ in 0..(asset.frames() * 2) {
            let (l, r) = clip.next_frame();
            assert_eq!(l, 0.5);
            assert_eq!(r, 0.5);
        }
        assert!(start < end);
    }

    #[test]
    fn real_chain_has_no_filters_or_modulation() {
        let chain = NoiseChain::real(SoundMode::WaterfallReal, asset_seconds(2.0, 44_100), 44_100.0);
        assert!(chain.is_real());
        assert!(!chain.has_filters());
        assert!(!chain.has_modulation());
        let (start, end) = chain.clip_bounds().unwrap();
        assert!(start < end);
    }

    #[test]
    fn synth_chain_has_both_stages_and_lfo() {
        let cfg = chain_config(SoundMode::Waterfall, 0.7).unwrap();
        let chain = NoiseChain::synth_seeded(cfg, 44_100.0, 1);
        assert!(!chain.is_real());
        assert!(chain.has_filters());
        assert!(chain.has_modulation());
        assert!(chain.clip_bounds().is_none());
    }

    #[test]
    fn synth_output_is_finite_and_bounded() {
        for mode in crate::mode::SYNTH_MODES {
            let cfg = chain_config(mode, 0.8).unwrap();
            let mut chain = NoiseChain::synth_seeded(cfg, 44_100.0, 42);
            for _ in 0..20_000 {
                let f = chain.tick();
                assert!(f.left.is_finite());
                assert!(f.left.abs() < 4.0, "{mode}: runaway filter output");
                assert!(f.gain_offset.abs() <= 0.2);
            }
        }
    }

    #[test]
    fn retune_applies_to_synth_only() {
        let cfg = chain_config(SoundMode::Wind, 0.2).unwrap();
        let mut chain = NoiseChain::synth_seeded(cfg, 44_100.0, 5);
        let next = chain_config(SoundMode::Wind, 0.9).unwrap();
        assert!(chain.retune(&next));
        assert!((chain.intensity() - 0.9).abs() < 1e-6);

        let mut real =
            NoiseChain::real(SoundMode::SeaReal, asset_seconds(2.0, 44_100), 44_100.0);
        let cfg = chain_config(SoundMode::Wind, 0.5).unwrap();
        assert!(!real.retune(&cfg));
    }

    #[test]
    fn lfo_offset_stays_within_depth() {
        let mut lfo = Lfo::new(0.5, 0.02, 44_100.0);
        for _ in 0..100_000 {
            assert!(lfo.next().abs() <= 0.02 + 1e-6);
        }
    }
}

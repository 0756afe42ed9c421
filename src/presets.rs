//! Per-mode tone shaping curves.
//!
//! Every synthetic mode is described by one `PresetCurve`: a base noise
//! color, two shaping filter stages and a modulation pair, each endpoint
//! interpolated linearly by the 0..1 intensity value. Adding a mode is a
//! table entry, not new branching logic.

use crate::mode::SoundMode;
use crate::noise::NoiseColor;
use biquad::{Coefficients, ToHertz, Type};

/// Linear interpolation endpoints: value at intensity 0 and intensity 1.
#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub lo: f32,
    pub hi: f32,
}

impl Span {
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    pub const fn fixed(v: f32) -> Self {
        Self { lo: v, hi: v }
    }

    #[inline]
    pub fn at(&self, t: f32) -> f32 {
        self.lo + (self.hi - self.lo) * t.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    AllPass,
    LowPass,
    HighPass,
    BandPass,
    HighShelf,
    Peaking,
}

#[derive(Debug, Clone, Copy)]
pub struct StageCurve {
    pub kind: StageKind,
    pub freq: Span,
    pub q: Span,
    pub gain_db: Span,
}

impl StageCurve {
    const fn flat(kind: StageKind, freq: Span, q: f32) -> Self {
        Self {
            kind,
            freq,
            q: Span::fixed(q),
            gain_db: Span::fixed(0.0),
        }
    }

    fn at(&self, intensity: f32) -> StageConfig {
        StageConfig {
            kind: self.kind,
            freq: self.freq.at(intensity),
            q: self.q.at(intensity),
            gain_db: self.gain_db.at(intensity),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PresetCurve {
    pub stage1: StageCurve,
    pub stage2: StageCurve,
    pub lfo_freq: Span,
    pub lfo_depth: Span,
}

// The base colors share one curve: a low-pass that opens with intensity
// (2500 Hz closed, 8000 Hz fully open) over a gentle rumble high-pass.
const BASE_COLORS: PresetCurve = PresetCurve {
    stage1: StageCurve::flat(StageKind::LowPass, Span::new(2500.0, 8000.0), 0.2),
    stage2: StageCurve::flat(StageKind::HighPass, Span::new(20.0, 100.0), 0.1),
    lfo_freq: Span::new(0.08, 0.30),
    lfo_depth: Span::new(0.0, 0.02),
};

const WATERFALL: PresetCurve = PresetCurve {
    stage1: StageCurve {
        kind: StageKind::BandPass,
        freq: Span::new(800.0, 1700.0),
        q: Span::new(0.4, 1.3),
        gain_db: Span::fixed(0.0),
    },
    stage2: StageCurve {
        kind: StageKind::HighShelf,
        freq: Span::fixed(2500.0),
        q: Span::fixed(0.7),
        gain_db: Span::new(-6.0, -4.0),
    },
    lfo_freq: Span::new(0.12, 0.47),
    lfo_depth: Span::new(0.01, 0.04),
};

const RAIN: PresetCurve = PresetCurve {
    stage1: StageCurve::flat(StageKind::HighPass, Span::new(180.0, 600.0), 0.7),
    stage2: StageCurve::flat(StageKind::LowPass, Span::new(6500.0, 15500.0), 0.5),
    lfo_freq: Span::new(0.30, 0.80),
    lfo_depth: Span::new(0.008, 0.028),
};

const WIND: PresetCurve = PresetCurve {
    stage1: StageCurve::flat(StageKind::LowPass, Span::new(600.0, 1500.0), 0.6),
    stage2: StageCurve::flat(StageKind::HighPass, Span::new(40.0, 160.0), 0.2),
    lfo_freq: Span::new(0.05, 0.23),
    lfo_depth: Span::new(0.03, 0.09),
};

const FAN: PresetCurve = PresetCurve {
    stage1: StageCurve::flat(StageKind::LowPass, Span::new(300.0, 850.0), 0.9),
    stage2: StageCurve {
        kind: StageKind::Peaking,
        freq: Span::new(120.0, 240.0),
        q: Span::fixed(1.2),
        gain_db: Span::new(2.0, 6.0),
    },
    lfo_freq: Span::new(0.90, 2.50),
    lfo_depth: Span::new(0.005, 0.020),
};

const VACUUM: PresetCurve = PresetCurve {
    stage1: StageCurve::flat(StageKind::HighPass, Span::new(120.0, 340.0), 0.6),
    stage2: StageCurve {
        kind: StageKind::HighShelf,
        freq: Span::fixed(1500.0),
        q: Span::fixed(0.7),
        gain_db: Span::new(2.0, 8.0),
    },
    lfo_freq: Span::fixed(0.25),
    lfo_depth: Span::fixed(0.004),
};

/// Preset curve for a synthetic mode; `None` for real-recording modes, which
/// bypass the filter chain entirely.
pub fn preset_for(mode: SoundMode) -> Option<&'static PresetCurve> {
    match mode {
        SoundMode::White | SoundMode::Pink | SoundMode::Brown => Some(&BASE_COLORS),
        SoundMode::Waterfall => Some(&WATERFALL),
        SoundMode::Rain => Some(&RAIN),
        SoundMode::Wind => Some(&WIND),
        SoundMode::Fan => Some(&FAN),
        SoundMode::Vacuum => Some(&VACUUM),
        SoundMode::WaterfallReal | SoundMode::SeaReal => None,
    }
}

/// One shaping stage resolved at a concrete intensity.
#[derive(Debug, Clone, Copy)]
pub struct StageConfig {
    pub kind: StageKind,
    pub freq: f32,
    pub q: f32,
    pub gain_db: f32,
}

// Unity passthrough, used when a parameter combination is rejected by the
// coefficient math. Keeps the stage in the chain as a clean path.
const PASSTHROUGH: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

impl StageConfig {
    /// Biquad coefficients at the given sample rate. Frequencies are kept
    /// strictly inside (0, 0.45 * fs); a failed computation degrades to a
    /// passthrough stage rather than erroring out of a rebuild.
    pub fn coefficients(&self, sample_rate: f32) -> Coefficients<f32> {
        let f0 = self.freq.clamp(10.0, sample_rate * 0.45);
        let q = self.q.max(1e-3);
        let ty = match self.kind {
            StageKind::AllPass => Type::AllPass,
            StageKind::LowPass => Type::LowPass,
            StageKind::HighPass => Type::HighPass,
            StageKind::BandPass => Type::BandPass,
            StageKind::HighShelf => Type::HighShelf(self.gain_db),
            StageKind::Peaking => Type::PeakingEQ(self.gain_db),
        };
        match Coefficients::<f32>::from_params(ty, sample_rate.hz(), f0.hz(), q) {
            Ok(c) => c,
            Err(e) => {
                log::warn!(
                    "filter stage rejected ({:?} f0={} q={}): {:?}; using passthrough",
                    self.kind,
                    f0,
                    q,
                    e
                );
                PASSTHROUGH
            }
        }
    }
}

/// Full synthesized-chain recipe for (mode, intensity).
#[derive(Debug, Clone, Copy)]
pub struct ChainConfig {
    pub mode: SoundMode,
    pub intensity: f32,
    pub color: NoiseColor,
    /// Generator drive ahead of the filters; intensity opens it up.
    pub level: f32,
    pub stages: [StageConfig; 2],
    pub lfo_freq: f32,
    pub lfo_depth: f32,
}

/// Resolve the preset table at a concrete intensity. Returns `None` for
/// real-recording modes.
pub fn chain_config(mode: SoundMode, intensity: f32) -> Option<ChainConfig> {
    let intensity = intensity.clamp(0.0, 1.0);
    let curve = preset_for(mode)?;
    let color = mode.base_color()?;
    Some(ChainConfig {
        mode,
        intensity,
        color,
        level: 0.18 + 0.35 * intensity,
        stages: [curve.stage1.at(intensity), curve.stage2.at(intensity)],
        lfo_freq: curve.lfo_freq.at(intensity),
        lfo_depth: curve.lfo_depth.at(intensity),
    })
}

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Spectral color of the raw noise source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

// Paul Kellet's economical pink noise approximation: seven one-pole filters
// fed from the same white sample, summed and scaled so peaks land in roughly
// the same range as the white input.
const PINK_SCALE: f32 = 0.11;

// Brown noise integrates white with a small coefficient, which kills most of
// the energy; scale the clamped integrator back up to a comparable loudness.
const BROWN_STEP: f32 = 0.02;
const BROWN_SCALE: f32 = 1.5;

/// Continuous colored noise generator. Each output sample is derived from a
/// fresh random draw run through persistent per-color filter state, so the
/// stream has no loop point and no audible seam at any length.
///
/// State is a handful of floats; `next()` performs no allocation and no
/// locking and is safe to call from the audio render callback.
pub struct ColoredNoise {
    color: NoiseColor,
    /// Generator output gain, ahead of the shaping filters. Separate from
    /// master volume: it sets how hot the source runs before the preset
    /// filters attenuate it.
    level: f32,
    rng: SmallRng,
    // Pink filter bank state (Paul Kellet).
    p: [f32; 7],
    // Brown integrator state.
    brown: f32,
}

impl ColoredNoise {
    pub fn new(color: NoiseColor) -> Self {
        Self::with_seed(color, rand::thread_rng().next_u64())
    }

    pub fn with_seed(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            level: 1.0,
            rng: SmallRng::seed_from_u64(seed),
            p: [0.0; 7],
            brown: 0.0,
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..=1.0);

        let sample = match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                let p = &mut self.p;
                p[0] = 0.99886 * p[0] + white * 0.0555179;
                p[1] = 0.99332 * p[1] + white * 0.0750759;
                p[2] = 0.96900 * p[2] + white * 0.1538520;
                p[3] = 0.86650 * p[3] + white * 0.3104856;
                p[4] = 0.55000 * p[4] + white * 0.5329522;
                p[5] = -0.7616 * p[5] - white * 0.0168980;
                let pink = p[0] + p[1] + p[2] + p[3] + p[4] + p[5] + p[6] + white * 0.5362;
                p[6] = white * 0.115926;
                pink * PINK_SCALE
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + white * BROWN_STEP).clamp(-1.0, 1.0);
                self.brown * BROWN_SCALE
            }
        };

        sample * self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_stays_in_unit_range() {
        let mut gen = ColoredNoise::with_seed(NoiseColor::White, 7);
        for _ in 0..10_000 {
            let s = gen.next();
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn pink_is_bounded_and_nonzero() {
        let mut gen = ColoredNoise::with_seed(NoiseColor::Pink, 7);
        let mut energy = 0.0f32;
        for _ in 0..40_000 {
            let s = gen.next();
            assert!(s.is_finite());
            assert!(s.abs() < 1.5, "pink sample escaped expected range: {s}");
            energy += s * s;
        }
        assert!(energy > 0.0);
    }

    #[test]
    fn brown_is_clamped_before_scaling() {
        let mut gen = ColoredNoise::with_seed(NoiseColor::Brown, 7);
        for _ in 0..40_000 {
            let s = gen.next();
            assert!(s.abs() <= BROWN_SCALE + 1e-6);
        }
    }

    #[test]
    fn brown_has_less_high_frequency_energy_than_white() {
        // Successive-difference energy is a crude high-frequency measure;
        // the integrator must smooth the stream well below white.
        let mut white = ColoredNoise::with_seed(NoiseColor::White, 3);
        let mut brown = ColoredNoise::with_seed(NoiseColor::Brown, 3);
        let diff_energy = |gen: &mut ColoredNoise| {
            let mut prev = gen.next();
            let mut acc = 0.0f32;
            for _ in 0..20_000 {
                let s = gen.next();
                acc += (s - prev) * (s - prev);
                prev = s;
            }
            acc
        };
        assert!(diff_energy(&mut brown) < diff_energy(&mut white) * 0.1);
    }

    #[test]
    fn level_scales_output() {
        let mut a = ColoredNoise::with_seed(NoiseColor::White, 11);
        let mut b = ColoredNoise::with_seed(NoiseColor::White, 11);
        b.set_level(0.5);
        for _ in 0..100 {
            assert!((a.next() * 0.5 - b.next()).abs() < 1e-6);
        }
    }

    #[test]
    fn level_is_clamped() {
        let mut gen = ColoredNoise::new(NoiseColor::Pink);
        gen.set_level(3.0);
        assert!((gen.level() - 1.0).abs() < f32::EPSILON);
        gen.set_level(-1.0);
        assert_eq!(gen.level(), 0.0);
    }
}

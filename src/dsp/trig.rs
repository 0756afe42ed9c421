use once_cell::sync::Lazy;

const TABLE_SIZE: usize = 1 << 14; // 16384 steps, plenty for sub-audio LFO rates
const TWO_PI: f32 = std::f32::consts::PI * 2.0;

/// Interpolated sine lookup table. The modulation oscillator runs well below
/// 3 Hz, so table resolution dominates phase error, not interpolation.
pub struct TrigLut {
    table: Vec<f32>,
}

impl TrigLut {
    fn new() -> Self {
        let mut table = Vec::with_capacity(TABLE_SIZE + 1);
        for i in 0..=TABLE_SIZE {
            let angle = i as f32 / TABLE_SIZE as f32 * TWO_PI;
            table.push(angle.sin());
        }
        Self { table }
    }

    #[inline(always)]
    fn sin(&self, angle: f32) -> f32 {
        let pos = angle.rem_euclid(TWO_PI) / TWO_PI * TABLE_SIZE as f32;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f32;
        let a = self.table[idx];
        let b = self.table[idx + 1];
        a + (b - a) * frac
    }
}

pub static LUT: Lazy<TrigLut> = Lazy::new(TrigLut::new);

#[inline(always)]
pub fn sin_lut(angle: f32) -> f32 {
    LUT.sin(angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_tracks_std_sin() {
        for i in 0..1000 {
            let angle = i as f32 * 0.017;
            assert!((sin_lut(angle) - angle.sin()).abs() < 1e-3);
        }
    }

    #[test]
    fn lut_handles_negative_angles() {
        assert!((sin_lut(-1.5) - (-1.5f32).sin()).abs() < 1e-3);
    }
}

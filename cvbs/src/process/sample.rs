//! Sample arithmetic in the 8-bit working domain.
//!
//! Every source sample is brought into an unsigned-biased 8-bit scale (0..=255, blanking
//! near 63.75) before any correction runs. Intermediate values are `i32` so that the
//! unclamped results of combination survive until the output stage saturates them.

use crate::structs::config::CombineMode;
use crate::structs::format::{BitWidth, Signedness};

/// Blanking level in the 8-bit domain (0 IRE).
pub const IRE_FLOOR: f64 = 63.75;
/// Span from blanking to peak in the 8-bit domain.
pub const IRE_RANGE: f64 = 255.0 - IRE_FLOOR;
/// 8-bit steps per IRE unit.
pub const IRE_SCALE: f64 = IRE_RANGE / 100.0;
/// Values at or below this level are never amplified.
pub const NOISE_FLOOR: i32 = 5;
pub const MAX_LEVEL: i32 = 255;

/// A sample as stored in the source, before any conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

impl RawSample {
    /// Decode one little-endian sample from the front of `bytes`.
    pub fn read(bytes: &[u8], bit_width: BitWidth, signedness: Signedness) -> Self {
        match (bit_width, signedness) {
            (BitWidth::Eight, Signedness::Unsigned) => RawSample::U8(bytes[0]),
            (BitWidth::Eight, Signedness::Signed) => RawSample::I8(bytes[0] as i8),
            (BitWidth::Sixteen, Signedness::Unsigned) => {
                RawSample::U16(u16::from_le_bytes([bytes[0], bytes[1]]))
            }
            (BitWidth::Sixteen, Signedness::Signed) => {
                RawSample::I16(i16::from_le_bytes([bytes[0], bytes[1]]))
            }
        }
    }

    /// Value centred on zero at the sample's native width.
    pub fn centered(self) -> i32 {
        match self {
            RawSample::U8(v) => v as i32 - 128,
            RawSample::I8(v) => v as i32,
            RawSample::U16(v) => v as i32 - 32_768,
            RawSample::I16(v) => v as i32,
        }
    }

    /// Value biased to be non-negative at the sample's native width.
    pub fn biased(self) -> i32 {
        match self {
            RawSample::U8(_) | RawSample::I8(_) => self.centered() + 128,
            RawSample::U16(_) | RawSample::I16(_) => self.centered() + 32_768,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, RawSample::U16(_) | RawSample::I16(_))
    }
}

/// Bring a single sample into the 8-bit domain (16-bit sources keep their high byte).
pub fn reduce(sample: RawSample) -> i32 {
    if sample.is_wide() {
        sample.biased() >> 8
    } else {
        sample.biased()
    }
}

/// Merge a primary and a secondary sample of the same format.
///
/// [`CombineMode::Sum`] on 16-bit input clamps only the lower bound; the upper bound is
/// left to the output gain stage. On 8-bit input it does not clamp at all.
pub fn combine(primary: RawSample, secondary: RawSample, mode: CombineMode) -> i32 {
    match (primary.is_wide(), mode) {
        (true, CombineMode::Sum) => {
            let sum = (primary.centered() + secondary.centered()) as f64;
            let reduced = (sum / 256.0).round() as i32;
            reduced.max(-128) + 128
        }
        (true, CombineMode::Average) => {
            let average = (primary.biased() + secondary.biased()) as f64 / 2.0;
            (average / 256.0).round() as i32
        }
        (false, CombineMode::Sum) => primary.centered() + secondary.centered() + 128,
        (false, CombineMode::Average) => {
            ((primary.biased() + secondary.biased()) as f64 / 2.0).round() as i32
        }
    }
}

/// Scale a sample's distance from the burst mean by `1 / chroma_gain`.
pub fn chroma_correct(value: i32, burst_mean: f64, chroma_gain: f64) -> i32 {
    ((value as f64 - burst_mean) / chroma_gain + burst_mean).round() as i32
}

/// Remap active video for an IRE offset; an offset of 0 is the identity.
pub fn ire_shift(value: i32, ire_offset: f64) -> i32 {
    if ire_offset == 0.0 {
        return value;
    }

    let shift = ire_offset * IRE_SCALE;
    let gain = IRE_RANGE / (IRE_RANGE + shift);
    let level = (value as f64 - IRE_FLOOR).max(0.0);

    (level * gain + shift + IRE_FLOOR).round() as i32
}

/// Apply output gain above the noise floor, clipping at full scale.
pub fn apply_gain(value: i32, signal_gain: f64) -> i32 {
    if value > NOISE_FLOOR {
        ((value as f64 * signal_gain).round() as i32).min(MAX_LEVEL)
    } else {
        value
    }
}

/// Store a working value as a device byte.
///
/// A signed device takes the value re-biased by -128.
pub fn to_output(value: i32, output_signed: bool) -> u8 {
    let value = value.clamp(0, MAX_LEVEL);
    if output_signed {
        (value - 128) as i8 as u8
    } else {
        value as u8
    }
}

use std::fmt::Display;

use serde::Serialize;

use crate::structs::format::BitWidth;

/// Nominal 4fsc sample rate for NTSC (Hz).
pub const NTSC_SAMPLE_RATE: u32 = 14_318_181;

/// Nominal 4fsc sample rate for PAL (Hz).
pub const PAL_SAMPLE_RATE: u32 = 17_734_475;

const AUDIO_SAMPLE_RATE: f64 = 44_100.0;
const AUDIO_BYTES_PER_FRAME: u32 = 4; // 16-bit stereo

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    Ntsc,
    Pal,
}

/// Parity of the field currently being streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldParity {
    Even,
    Odd,
}

impl FieldParity {
    pub fn of(field_cnt: u32) -> Self {
        if field_cnt % 2 == 0 {
            FieldParity::Even
        } else {
            FieldParity::Odd
        }
    }
}

/// Line and frame geometry of one channel, in source bytes.
///
/// Byte positions double for 16-bit sources; `frame_line_count` is a line count and
/// `audio_frame_bytes` belongs to the audio stream, so neither scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub frame_length: u32,
    pub line_length: u32,
    pub frame_line_count: u32,
    pub v_start: u32,
    pub v_end: u32,
    pub cburst_start: u32,
    pub cburst_end: u32,
    pub audio_frame_bytes: u32,
}

impl Timing {
    /// Lines in the field of the given parity.
    ///
    /// Even fields carry the extra half line rounded up.
    pub fn field_line_count(&self, parity: FieldParity) -> u32 {
        match parity {
            FieldParity::Even => self.frame_line_count.div_ceil(2),
            FieldParity::Odd => self.frame_line_count / 2,
        }
    }

    /// Bytes a frame occupies in the source file.
    ///
    /// TBC captures store one additional line per frame.
    pub fn source_frame_bytes(&self, is_tbc: bool) -> u64 {
        if is_tbc {
            self.frame_length as u64 + self.line_length as u64
        } else {
            self.frame_length as u64
        }
    }
}

impl VideoStandard {
    /// Infer the standard from a 4fsc sample rate.
    pub fn from_sample_rate(rate: u32) -> Option<Self> {
        match rate {
            14_318_181 | 14_318_170 => Some(VideoStandard::Ntsc),
            17_734_475 | 17_735_845 => Some(VideoStandard::Pal),
            _ => None,
        }
    }

    pub fn sample_rate(self) -> u32 {
        match self {
            VideoStandard::Ntsc => NTSC_SAMPLE_RATE,
            VideoStandard::Pal => PAL_SAMPLE_RATE,
        }
    }

    pub fn frame_rate(self) -> f64 {
        match self {
            VideoStandard::Ntsc => 30_000.0 / 1_001.0,
            VideoStandard::Pal => 25.0,
        }
    }

    /// Index (within a field) of the line whose colour burst calibrates chroma gain.
    pub fn reference_line(self, parity: FieldParity) -> u32 {
        match (self, parity) {
            (VideoStandard::Ntsc, FieldParity::Even) => 20,
            (VideoStandard::Ntsc, FieldParity::Odd) => 21,
            (VideoStandard::Pal, FieldParity::Even) => 22,
            (VideoStandard::Pal, FieldParity::Odd) => 23,
        }
    }
}

impl Display for VideoStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoStandard::Ntsc => write!(f, "NTSC"),
            VideoStandard::Pal => write!(f, "PAL"),
        }
    }
}

/// Timing constants for `standard` read at `bit_width`.
pub fn timing_for(standard: VideoStandard, bit_width: BitWidth) -> Timing {
    // (line, lines per frame, active video, colour burst) in 8-bit samples
    let (line_length, frame_line_count, (v_start, v_end), (cburst_start, cburst_end)) =
        match standard {
            VideoStandard::Ntsc => (910, 525, (134, 894), (74, 110)),
            VideoStandard::Pal => (1135, 625, (185, 1107), (98, 138)),
        };

    let audio_frames = (AUDIO_SAMPLE_RATE / standard.frame_rate()).round() as u32;
    let scale = bit_width.bytes() as u32;

    Timing {
        frame_length: line_length * frame_line_count * scale,
        line_length: line_length * scale,
        frame_line_count,
        v_start: v_start * scale,
        v_end: v_end * scale,
        cburst_start: cburst_start * scale,
        cburst_end: cburst_end * scale,
        audio_frame_bytes: audio_frames * AUDIO_BYTES_PER_FRAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARDS: [VideoStandard; 2] = [VideoStandard::Ntsc, VideoStandard::Pal];

    #[test]
    fn sixteen_bit_doubles_byte_lengths() {
        for standard in STANDARDS {
            let narrow = timing_for(standard, BitWidth::Eight);
            let wide = timing_for(standard, BitWidth::Sixteen);

            assert_eq!(wide.line_length, narrow.line_length * 2);
            assert_eq!(wide.frame_length, narrow.frame_length * 2);
            assert_eq!(wide.v_start, narrow.v_start * 2);
            assert_eq!(wide.cburst_end, narrow.cburst_end * 2);
            assert_eq!(wide.frame_line_count, narrow.frame_line_count);
            assert_eq!(wide.audio_frame_bytes, narrow.audio_frame_bytes);
        }
    }

    #[test]
    fn eight_bit_matches_4fsc_geometry() {
        let ntsc = timing_for(VideoStandard::Ntsc, BitWidth::Eight);
        assert_eq!(ntsc.line_length, 910);
        assert_eq!(ntsc.frame_length, 477_750);
        assert_eq!(ntsc.audio_frame_bytes, 5884);

        let pal = timing_for(VideoStandard::Pal, BitWidth::Eight);
        assert_eq!(pal.line_length, 1135);
        assert_eq!(pal.frame_length, 709_375);
        assert_eq!(pal.audio_frame_bytes, 7056);
    }

    #[test]
    fn field_line_counts_sum_to_frame() {
        for standard in STANDARDS {
            let timing = timing_for(standard, BitWidth::Eight);
            let even = timing.field_line_count(FieldParity::Even);
            let odd = timing.field_line_count(FieldParity::Odd);
            assert_eq!(even + odd, timing.frame_line_count);
            assert_eq!(even, odd + 1);
        }
    }

    #[test]
    fn sample_rate_inference() {
        assert_eq!(
            VideoStandard::from_sample_rate(14_318_170),
            Some(VideoStandard::Ntsc)
        );
        assert_eq!(
            VideoStandard::from_sample_rate(PAL_SAMPLE_RATE),
            Some(VideoStandard::Pal)
        );
        assert_eq!(VideoStandard::from_sample_rate(100_000_000), None);
    }
}

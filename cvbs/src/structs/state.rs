use crate::standard::{FieldParity, Timing};

/// Position of one channel within the video stream.
///
/// Survives across buffer fills and is only ever touched by the channel's own pipeline.
/// `sample_cnt` and `line_sample_cnt` count source bytes; `line_cnt` counts lines within
/// the current field.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ChannelState {
    pub sample_cnt: u32,
    pub line_cnt: u32,
    pub line_sample_cnt: u32,
    pub field_cnt: u32,
    pub burst: BurstAverage,
}

/// Running mean of colour-burst samples on the reference line of the current field.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BurstAverage {
    pub mean: f64,
    pub count: u32,
}

impl BurstAverage {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl ChannelState {
    pub fn parity(&self) -> FieldParity {
        FieldParity::of(self.field_cnt)
    }

    /// Move past one sample of `stride` bytes, wrapping line and field counters.
    pub fn advance(&mut self, stride: u32, timing: &Timing) {
        self.sample_cnt += stride;
        self.line_sample_cnt += stride;

        if self.line_sample_cnt >= timing.line_length {
            self.line_sample_cnt = 0;
            self.line_cnt += 1;

            if self.line_cnt >= timing.field_line_count(self.parity()) {
                self.line_cnt = 0;
                self.field_cnt = self.field_cnt.wrapping_add(1);
                self.burst.reset();
            }
        }
    }
}

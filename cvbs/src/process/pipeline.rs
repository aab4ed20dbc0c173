use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};

use crate::process::BUF_LEN;
use crate::process::sample::{
    RawSample, apply_gain, chroma_correct, combine, ire_shift, reduce, to_output,
};
use crate::process::skip::bytes_to_skip;
use crate::standard::{Timing, VideoStandard, timing_for};
use crate::structs::config::{ChannelConfig, Color, PipeRole, PlayerConfig};
use crate::structs::format::Signedness;
use crate::structs::state::ChannelState;
use crate::utils::device::Buffer;
use crate::utils::errors::{PipelineError, SourceError};
use crate::utils::side_channel::SideChannel;
use crate::utils::source::{ByteSource, InputReader};

/// Decodes and conditions one channel, one buffer per [`run`](Self::run).
///
/// Owns everything the channel touches: its sources, its [`ChannelState`] and, when the
/// channel holds a side-channel role, the side-channel output. No two pipelines share
/// any of it, so channels can run on separate threads without synchronisation.
pub struct ChannelPipeline {
    config: ChannelConfig,
    standard: VideoStandard,
    timing: Timing,
    output_signed: bool,
    state: ChannelState,
    primary: Box<dyn ByteSource>,
    secondary: Option<Box<dyn ByteSource>>,
    audio: Option<Box<dyn ByteSource>>,
    side_channel: Option<SideChannel>,
    input: Vec<u8>,
    combine_input: Vec<u8>,
    audio_chunk: Vec<u8>,
    buffers_filled: u64,
}

impl ChannelPipeline {
    pub fn new(
        config: ChannelConfig,
        standard: VideoStandard,
        output_signed: bool,
        primary: Box<dyn ByteSource>,
    ) -> Self {
        let timing = timing_for(standard, config.bit_width);

        Self {
            config,
            standard,
            timing,
            output_signed,
            state: ChannelState::default(),
            primary,
            secondary: None,
            audio: None,
            side_channel: None,
            input: Vec::new(),
            combine_input: Vec::new(),
            audio_chunk: vec![0; timing.audio_frame_bytes as usize],
            buffers_filled: 0,
        }
    }

    /// Second source merged into this channel according to its combine mode.
    pub fn with_secondary(mut self, source: Box<dyn ByteSource>) -> Self {
        self.secondary = Some(source);
        self
    }

    /// Audio read one video frame at a time when the channel is the audio-sync channel.
    pub fn with_audio(mut self, source: Box<dyn ByteSource>) -> Self {
        self.audio = Some(source);
        self
    }

    pub fn with_side_channel(mut self, side_channel: SideChannel) -> Self {
        self.side_channel = Some(side_channel);
        self
    }

    /// Open and position every source `config` names.
    ///
    /// The side channel is attached only when the channel holds a role and stdout is
    /// not a terminal.
    pub fn open(config: &ChannelConfig, player: &PlayerConfig) -> Result<Self, SourceError> {
        let color = config.color;
        let primary = open_source(color, &config.path, config.start_offset)?;
        info!(
            "({color}) : {} at byte {} ({}, {:?}{})",
            config.path.display(),
            config.start_offset,
            config.bit_width,
            config.signedness,
            if config.is_tbc { ", TBC" } else { "" }
        );

        let output_signed = player.output_signedness == Signedness::Signed;
        let mut pipeline = Self::new(
            config.clone(),
            player.timing_standard(),
            output_signed,
            Box::new(primary),
        );

        if let Some(path) = &config.combine_path {
            let secondary = open_source(color, path, config.start_offset)?;
            info!(
                "({color}) : combining with {} ({:?})",
                path.display(),
                config.combine_mode
            );
            pipeline = pipeline.with_secondary(Box::new(secondary));
        }

        if config.pipe_role == PipeRole::None {
            return Ok(pipeline);
        }

        let Some(side_channel) = SideChannel::stdout() else {
            warn!("({color}) : stdout is a terminal, side-channel output disabled");
            return Ok(pipeline);
        };
        pipeline = pipeline.with_side_channel(side_channel);

        if let (PipeRole::AudioSync, Some(audio)) = (config.pipe_role, &player.audio) {
            let offset = player.audio_start_offset().unwrap_or(audio.offset);
            let source = open_source(color, &audio.path, offset)?;
            info!(
                "({color}) : audio sync from {} at byte {offset}",
                audio.path.display()
            );
            pipeline = pipeline.with_audio(Box::new(source));
        }

        Ok(pipeline)
    }

    pub fn color(&self) -> Color {
        self.config.color
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn buffers_filled(&self) -> u64 {
        self.buffers_filled
    }

    /// Produce the next [`BUF_LEN`]-byte buffer.
    ///
    /// Reads everything the buffer needs (plus TBC skip lines) up front, then walks the
    /// samples. A short read from any attached source yields
    /// [`PipelineError::Exhausted`]; a raised `shutdown` flag yields
    /// [`PipelineError::Cancelled`] and no buffer.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<Buffer, PipelineError> {
        let Self {
            config,
            standard,
            timing,
            output_signed,
            state,
            primary,
            secondary,
            audio,
            side_channel,
            input,
            combine_input,
            audio_chunk,
            buffers_filled,
        } = self;
        let color = config.color;
        let stride = config.bit_width.bytes();

        let sample_bytes = BUF_LEN * stride;
        let skip_bytes = if config.is_tbc {
            bytes_to_skip(
                state.sample_cnt,
                timing.line_length,
                timing.frame_length,
                sample_bytes as u64,
            ) as usize
        } else {
            0
        };
        let wanted = sample_bytes + skip_bytes;
        trace!("({color}) : reading {wanted} bytes ({skip_bytes} skipped)");

        fill_input(color, &mut **primary, input, wanted)?;
        let combined = match secondary {
            Some(source) => {
                fill_input(color, &mut **source, combine_input, wanted)?;
                Some(&combine_input[..wanted])
            }
            None => None,
        };

        let mut audio_out = match (config.pipe_role, audio, side_channel.as_mut()) {
            (PipeRole::AudioSync, Some(source), Some(side)) => Some((&mut **source, side)),
            _ => None,
        };

        let mut output = vec![0u8; BUF_LEN];
        let mut cursor = 0usize;

        for out in output.iter_mut() {
            if state.sample_cnt >= timing.frame_length {
                if config.is_tbc {
                    cursor += timing.line_length as usize;
                }
                state.sample_cnt = 0;
            }

            if state.sample_cnt == 0 {
                if let Some((source, side)) = audio_out.as_mut() {
                    forward_audio(color, &mut **source, &mut **side, audio_chunk)?;
                }
            }

            if state.line_sample_cnt == 0 && shutdown.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled { color });
            }

            let raw = RawSample::read(&input[cursor..], config.bit_width, config.signedness);
            let value = match combined {
                Some(other) => combine(
                    raw,
                    RawSample::read(&other[cursor..], config.bit_width, config.signedness),
                    config.combine_mode,
                ),
                None => reduce(raw),
            };

            let value = condition(value, config, *standard, timing, state);
            *out = to_output(value, *output_signed);

            cursor += stride;
            state.advance(stride as u32, timing);
        }
        debug_assert_eq!(cursor, wanted);

        if let Some(side) = side_channel.as_mut() {
            if config.pipe_role == PipeRole::RawEcho {
                side.write_all(&output)
                    .map_err(|source| PipelineError::SideChannel { color, source })?;
            }
            side.flush()
                .map_err(|source| PipelineError::SideChannel { color, source })?;
            trace!("({color}) : {} bytes on side channel", side.bytes_written());
        }

        *buffers_filled += 1;
        debug!(
            "({color}) : buffer {} filled (field {}, line {}, frame pos {})",
            buffers_filled, state.field_cnt, state.line_cnt, state.sample_cnt
        );

        Ok(Buffer::from_vec(output))
    }
}

fn open_source(
    color: Color,
    path: &std::path::Path,
    offset: u64,
) -> Result<InputReader, SourceError> {
    let mut source = InputReader::new(path).map_err(|source| SourceError::Open {
        color,
        path: path.to_path_buf(),
        source,
    })?;

    if offset > 0 {
        if source.is_pipe() {
            debug!("({color}) : discarding {offset} bytes from stdin");
        }
        source
            .seek_to(offset)
            .map_err(|source| SourceError::Seek {
                color,
                offset,
                source,
            })?;
    }
    Ok(source)
}

fn fill_input(
    color: Color,
    source: &mut dyn ByteSource,
    input: &mut Vec<u8>,
    wanted: usize,
) -> Result<(), PipelineError> {
    input.resize(wanted, 0);
    let read = source
        .read_full(&mut input[..wanted])
        .map_err(|source| PipelineError::Io { color, source })?;

    if read < wanted {
        return Err(PipelineError::Exhausted {
            color,
            read,
            wanted,
        });
    }
    Ok(())
}

fn forward_audio(
    color: Color,
    source: &mut dyn ByteSource,
    side: &mut SideChannel,
    chunk: &mut [u8],
) -> Result<(), PipelineError> {
    let wanted = chunk.len();
    let read = source
        .read_full(chunk)
        .map_err(|source| PipelineError::Io { color, source })?;
    if read < wanted {
        return Err(PipelineError::Exhausted {
            color,
            read,
            wanted,
        });
    }

    side.write_all(chunk)
        .map_err(|source| PipelineError::SideChannel { color, source })
}

/// Chroma gain, IRE shift and output gain for the sample at the current position.
fn condition(
    mut value: i32,
    config: &ChannelConfig,
    standard: VideoStandard,
    timing: &Timing,
    state: &mut ChannelState,
) -> i32 {
    let reference_line = standard.reference_line(state.parity());
    let position = state.line_sample_cnt;

    if config.chroma_agc_enabled() {
        if state.line_cnt == reference_line
            && (timing.cburst_start..timing.cburst_end).contains(&position)
        {
            state.burst.push(value as f64);
        } else if state.line_cnt > reference_line
            && state.burst.count > 0
            && (timing.cburst_start..timing.v_end).contains(&position)
        {
            value = chroma_correct(value, state.burst.mean, config.chroma_gain);
        }
    }

    if config.ire_offset != 0.0
        && state.line_cnt > reference_line
        && (timing.v_start..timing.v_end).contains(&position)
    {
        value = ire_shift(value, config.ire_offset);
    }

    apply_gain(value, config.signal_gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::FieldParity;
    use crate::structs::format::BitWidth;
    use crate::utils::side_channel::tests::SharedBuffer;
    use std::io::Cursor;

    fn config(color: Color, path: &str) -> ChannelConfig {
        ChannelConfig::for_path(color, path)
    }

    fn zeros(len: usize) -> Box<dyn ByteSource> {
        Box::new(Cursor::new(vec![0u8; len]))
    }

    #[test]
    fn zero_tbc_source_end_to_end() -> anyhow::Result<()> {
        let mut cfg = config(Color::Red, "red.u8");
        cfg.is_tbc = true;
        let shutdown = AtomicBool::new(false);

        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Ntsc, true, zeros(2 * BUF_LEN + 4096));
        let buffer = pipeline.run(&shutdown)?;

        assert_eq!(buffer.len(), BUF_LEN);
        assert!(buffer.iter().all(|&b| b == to_output(0, true)));

        let timing = *pipeline.timing();
        let skip = bytes_to_skip(0, timing.line_length, timing.frame_length, BUF_LEN as u64);
        assert_eq!(skip, 2 * 910);

        let state = pipeline.state();
        let samples = BUF_LEN as u32;
        assert_eq!(state.sample_cnt, samples % timing.frame_length);
        assert_eq!(state.line_sample_cnt, samples % timing.line_length);

        let lines = samples / timing.line_length;
        let frame_lines = lines % timing.frame_line_count;
        let even = timing.field_line_count(FieldParity::Even);
        assert_eq!(state.line_cnt, frame_lines - even);
        assert_eq!(state.field_cnt, 2 * (lines / timing.frame_line_count) + 1);
        Ok(())
    }

    #[test]
    fn tbc_skips_extra_line_per_frame() -> anyhow::Result<()> {
        // Frame bytes are 1, the extra TBC line is 2: anything that leaks through shows.
        let timing = timing_for(VideoStandard::Ntsc, BitWidth::Eight);
        let frame = timing.frame_length as usize;
        let line = timing.line_length as usize;
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(std::iter::repeat_n(1u8, frame));
            data.extend(std::iter::repeat_n(2u8, line));
        }

        let mut cfg = config(Color::Green, "g.u8");
        cfg.is_tbc = true;
        let mut pipeline = ChannelPipeline::new(
            cfg,
            VideoStandard::Ntsc,
            false,
            Box::new(Cursor::new(data)),
        );
        let buffer = pipeline.run(&AtomicBool::new(false))?;
        assert!(buffer.iter().all(|&b| b == 1));
        Ok(())
    }

    #[test]
    fn sixteen_bit_reduces_and_advances_by_two() -> anyhow::Result<()> {
        let data: Vec<u8> = std::iter::repeat_n([0x00, 0x80], BUF_LEN)
            .flatten()
            .collect();
        let mut cfg = config(Color::Blue, "b.u16");
        cfg.signedness = Signedness::Unsigned;

        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Pal, false, Box::new(Cursor::new(data)));
        let buffer = pipeline.run(&AtomicBool::new(false))?;

        assert!(buffer.iter().all(|&b| b == 0x80));
        let timing = pipeline.timing();
        assert_eq!(
            pipeline.state().line_sample_cnt,
            (2 * BUF_LEN as u32) % timing.line_length
        );
        Ok(())
    }

    #[test]
    fn combines_secondary_source() -> anyhow::Result<()> {
        let mut cfg = config(Color::Red, "r.s16");
        cfg.combine_mode = crate::structs::config::CombineMode::Sum;
        let primary = zeros(2 * BUF_LEN);
        let secondary = zeros(2 * BUF_LEN);

        let mut pipeline = ChannelPipeline::new(cfg, VideoStandard::Ntsc, false, primary)
            .with_secondary(secondary);
        let buffer = pipeline.run(&AtomicBool::new(false))?;
        assert!(buffer.iter().all(|&b| b == 128));
        Ok(())
    }

    #[test]
    fn signal_gain_clips() -> anyhow::Result<()> {
        let mut cfg = config(Color::Red, "r.u8");
        cfg.signal_gain = 2.0;
        let mut pipeline = ChannelPipeline::new(
            cfg,
            VideoStandard::Ntsc,
            false,
            Box::new(Cursor::new(vec![200u8; BUF_LEN])),
        );
        let buffer = pipeline.run(&AtomicBool::new(false))?;
        assert!(buffer.iter().all(|&b| b == 255));
        Ok(())
    }

    #[test]
    fn ire_zero_leaves_active_video_untouched() -> anyhow::Result<()> {
        let data: Vec<u8> = (0..BUF_LEN).map(|i| (i % 251) as u8).collect();
        let run = |ire_offset: f64| -> anyhow::Result<Buffer> {
            let mut cfg = config(Color::Red, "r.u8");
            cfg.ire_offset = ire_offset;
            let mut pipeline = ChannelPipeline::new(
                cfg,
                VideoStandard::Ntsc,
                false,
                Box::new(Cursor::new(data.clone())),
            );
            Ok(pipeline.run(&AtomicBool::new(false))?)
        };

        let plain = run(0.0)?;
        assert_eq!(&plain[..], &data[..]);

        let shifted = run(10.0)?;
        assert_ne!(&shifted[..], &data[..]);
        // Lines before the reference line are never shifted.
        assert_eq!(&shifted[..910 * 20], &data[..910 * 20]);
        Ok(())
    }

    #[test]
    fn chroma_gain_uses_burst_reference() -> anyhow::Result<()> {
        let timing = timing_for(VideoStandard::Ntsc, BitWidth::Eight);
        let line = timing.line_length as usize;
        let mut data = vec![100u8; BUF_LEN];
        // Burst of the even field's reference line sits at 60.
        let reference = 20 * line;
        let burst = timing.cburst_start as usize..timing.cburst_end as usize;
        for b in &mut data[reference + burst.start..reference + burst.end] {
            *b = 60;
        }

        let mut cfg = config(Color::Green, "g.u8");
        cfg.chroma_gain = 2.0;
        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Ntsc, false, Box::new(Cursor::new(data)));
        let buffer = pipeline.run(&AtomicBool::new(false))?;

        let next_line = 21 * line;
        let active = next_line + timing.v_start as usize;
        assert_eq!(buffer[active], 80);
        assert_eq!(buffer[next_line + 10], 100);
        assert_eq!(buffer[reference + timing.cburst_start as usize], 60);
        Ok(())
    }

    #[test]
    fn odd_field_calibrates_on_its_own_reference_line() -> anyhow::Result<()> {
        let timing = timing_for(VideoStandard::Ntsc, BitWidth::Eight);
        let line = timing.line_length as usize;
        let odd_start = timing.field_line_count(FieldParity::Even) as usize;
        let burst = timing.cburst_start as usize..timing.cburst_end as usize;

        let mut data = vec![100u8; BUF_LEN];
        let reference = (odd_start + 21) * line;
        for b in &mut data[reference + burst.start..reference + burst.end] {
            *b = 60;
        }

        let mut cfg = config(Color::Red, "r.u8");
        cfg.chroma_gain = 2.0;
        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Ntsc, false, Box::new(Cursor::new(data)));
        let buffer = pipeline.run(&AtomicBool::new(false))?;

        let v_start = timing.v_start as usize;
        // Even field burst is flat 100, so correction there is the identity.
        assert_eq!(buffer[21 * line + v_start], 100);
        // Line 20 of the odd field comes before its reference line.
        assert_eq!(buffer[(odd_start + 20) * line + v_start], 100);
        assert_eq!(buffer[reference + burst.start], 60);
        assert_eq!(buffer[(odd_start + 22) * line + v_start], 80);
        Ok(())
    }

    #[test]
    fn pal_sixteen_bit_uses_pal_reference_and_doubled_windows() -> anyhow::Result<()> {
        // Positions below are in output samples; the source carries two bytes each.
        let timing = timing_for(VideoStandard::Pal, BitWidth::Eight);
        let line = timing.line_length as usize;
        let burst = timing.cburst_start as usize..timing.cburst_end as usize;
        let v_start = timing.v_start as usize;

        let mut samples = vec![100u8; BUF_LEN];
        let reference = 22 * line;
        for s in &mut samples[reference + burst.start..reference + burst.end] {
            *s = 60;
        }
        let data: Vec<u8> = samples.iter().flat_map(|&s| [0x00, s]).collect();

        let mut cfg = config(Color::Blue, "b.u16");
        cfg.chroma_gain = 2.0;
        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Pal, false, Box::new(Cursor::new(data)));
        let buffer = pipeline.run(&AtomicBool::new(false))?;

        // NTSC would already correct line 21.
        assert_eq!(buffer[21 * line + v_start], 100);
        assert_eq!(buffer[reference + burst.start], 60);
        assert_eq!(buffer[23 * line + burst.start - 1], 100);
        assert_eq!(buffer[23 * line + burst.start], 80);
        assert_eq!(buffer[23 * line + v_start], 80);
        Ok(())
    }

    #[test]
    fn sixteen_bit_tbc_discards_extra_line() -> anyhow::Result<()> {
        let timing = timing_for(VideoStandard::Ntsc, BitWidth::Sixteen);
        let frame_samples = timing.frame_length as usize / 2;
        let line_samples = timing.line_length as usize / 2;
        let mut data = Vec::new();
        for _ in 0..8 {
            data.extend(std::iter::repeat_n([0x00, 0x40], frame_samples).flatten());
            data.extend(std::iter::repeat_n([0x00, 0xF0], line_samples).flatten());
        }

        let cfg = config(Color::Red, "r.tbc");
        assert_eq!((cfg.bit_width, cfg.is_tbc), (BitWidth::Sixteen, true));
        let mut pipeline =
            ChannelPipeline::new(cfg, VideoStandard::Ntsc, false, Box::new(Cursor::new(data)));

        let shutdown = AtomicBool::new(false);
        for _ in 0..2 {
            let buffer = pipeline.run(&shutdown)?;
            assert!(buffer.iter().all(|&b| b == 0x40));
        }

        // 2 * 2 * BUF_LEN bytes streamed, five whole frames in
        let state = pipeline.state();
        assert_eq!(state.sample_cnt, 465_380);
        assert_eq!(state.field_cnt, 10);
        Ok(())
    }

    #[test]
    fn short_source_is_exhausted() {
        let mut pipeline = ChannelPipeline::new(
            config(Color::Blue, "b.u8"),
            VideoStandard::Ntsc,
            true,
            zeros(BUF_LEN / 2),
        );
        let err = pipeline.run(&AtomicBool::new(false)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Exhausted {
                color: Color::Blue,
                ..
            }
        ));
        assert_eq!(*pipeline.state(), ChannelState::default());
    }

    #[test]
    fn shutdown_cancels_without_buffer() {
        let mut pipeline = ChannelPipeline::new(
            config(Color::Red, "r.u8"),
            VideoStandard::Ntsc,
            true,
            zeros(BUF_LEN),
        );
        let err = pipeline.run(&AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(pipeline.buffers_filled(), 0);
    }

    #[test]
    fn audio_sync_interleaves_one_chunk_per_frame() -> anyhow::Result<()> {
        let timing = timing_for(VideoStandard::Ntsc, BitWidth::Eight);
        let chunk = timing.audio_frame_bytes as usize;
        let audio: Vec<u8> = (0..chunk * 4).map(|i| (i / chunk) as u8 + 1).collect();

        let mut cfg = config(Color::Red, "r.u8");
        cfg.pipe_role = PipeRole::AudioSync;
        let shared = SharedBuffer::default();
        let mut pipeline = ChannelPipeline::new(cfg, VideoStandard::Ntsc, true, zeros(BUF_LEN))
            .with_audio(Box::new(Cursor::new(audio)))
            .with_side_channel(SideChannel::new(shared.clone()));
        pipeline.run(&AtomicBool::new(false))?;

        // Frame starts at samples 0, 477750 and 955500.
        let written = shared.contents();
        assert_eq!(shared.flushes(), 1);
        assert_eq!(written.len(), 3 * chunk);
        assert_eq!(written[0], 1);
        assert_eq!(written[2 * chunk], 3);
        Ok(())
    }

    #[test]
    fn raw_echo_forwards_buffer() -> anyhow::Result<()> {
        let mut cfg = config(Color::Green, "g.u8");
        cfg.pipe_role = PipeRole::RawEcho;
        let shared = SharedBuffer::default();
        let mut pipeline = ChannelPipeline::new(
            cfg,
            VideoStandard::Ntsc,
            false,
            Box::new(Cursor::new(vec![42u8; BUF_LEN])),
        )
        .with_side_channel(SideChannel::new(shared.clone()));

        let buffer = pipeline.run(&AtomicBool::new(false))?;
        assert_eq!(shared.contents(), buffer.as_ref());
        assert_eq!(shared.flushes(), 1);
        Ok(())
    }
}

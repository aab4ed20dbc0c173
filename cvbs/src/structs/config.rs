use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;
use serde::Serialize;

use crate::standard::{VideoStandard, timing_for};
use crate::structs::format::{BitWidth, Signedness, format_for_path};
use crate::utils::errors::ConfigError;

pub const CHROMA_GAIN_RANGE: (f64, f64) = (0.0, 6.0);
pub const SIGNAL_GAIN_RANGE: (f64, f64) = (0.5, 2.0);
pub const IRE_OFFSET_RANGE: (f64, f64) = (-50.0, 50.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Red, Color::Green, Color::Blue];

    pub fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Green => 1,
            Color::Blue => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Red => write!(f, "RED"),
            Color::Green => write!(f, "GREEN"),
            Color::Blue => write!(f, "BLUE"),
        }
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "red" => Ok(Color::Red),
            "g" | "green" => Ok(Color::Green),
            "b" | "blue" => Ok(Color::Blue),
            _ => Err(ConfigError::UnknownChannel(s.to_string())),
        }
    }
}

/// How a secondary source is merged into the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    /// Signed sum re-biased to the 8-bit centre.
    #[default]
    Sum,
    /// Average of the raw values.
    Average,
}

impl CombineMode {
    pub fn from_index(index: u8) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(CombineMode::Sum),
            1 => Ok(CombineMode::Average),
            other => Err(ConfigError::InvalidCombineMode(other)),
        }
    }
}

/// Role a channel plays on the process-wide side-channel output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipeRole {
    #[default]
    None,
    /// Interleave one video frame's worth of audio at every frame start.
    AudioSync,
    /// Echo every conditioned buffer verbatim.
    RawEcho,
}

/// Join ordering of the channel tasks within one fill cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// R, G and B concurrently.
    #[default]
    Parallel,
    /// R alone, then G and B concurrently.
    RedFirst,
    /// R and G concurrently, then B.
    RedGreenFirst,
    /// R, then G, then B.
    Sequential,
}

impl ReadMode {
    pub fn from_index(index: u8) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(ReadMode::Parallel),
            1 => Ok(ReadMode::RedFirst),
            2 => Ok(ReadMode::RedGreenFirst),
            3 => Ok(ReadMode::Sequential),
            other => Err(ConfigError::InvalidReadMode(other)),
        }
    }
}

/// Explicit per-channel settings; `None` keeps the extension default.
#[derive(Debug, Clone, Default)]
pub struct ChannelOverrides {
    pub bit_width: Option<BitWidth>,
    pub signedness: Option<Signedness>,
    pub is_tbc: Option<bool>,
    pub combine_path: Option<PathBuf>,
    pub combine_mode: Option<CombineMode>,
    pub chroma_gain: Option<f64>,
    pub signal_gain: Option<f64>,
    pub ire_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelConfig {
    pub color: Color,
    pub path: PathBuf,
    pub combine_path: Option<PathBuf>,
    pub bit_width: BitWidth,
    pub signedness: Signedness,
    pub is_tbc: bool,
    pub combine_mode: CombineMode,
    pub chroma_gain: f64,
    pub signal_gain: f64,
    pub ire_offset: f64,
    pub start_offset: u64,
    pub pipe_role: PipeRole,
}

impl ChannelConfig {
    /// Configuration built from extension defaults alone.
    pub fn for_path<P: AsRef<Path>>(color: Color, path: P) -> Self {
        Self::resolve(color, path, ChannelOverrides::default(), Signedness::Signed)
    }

    /// Apply `overrides` on top of the extension defaults of `path`.
    ///
    /// `device_signedness` fills in when neither the extension nor an override decides.
    pub fn resolve<P: AsRef<Path>>(
        color: Color,
        path: P,
        overrides: ChannelOverrides,
        device_signedness: Signedness,
    ) -> Self {
        let defaults = format_for_path(&path);

        Self {
            color,
            path: path.as_ref().to_path_buf(),
            combine_path: overrides.combine_path,
            bit_width: overrides.bit_width.unwrap_or(defaults.bit_width),
            signedness: overrides
                .signedness
                .or(defaults.signedness)
                .unwrap_or(device_signedness),
            is_tbc: overrides.is_tbc.unwrap_or(defaults.is_tbc),
            combine_mode: overrides.combine_mode.unwrap_or_default(),
            chroma_gain: overrides.chroma_gain.unwrap_or(1.0),
            signal_gain: overrides.signal_gain.unwrap_or(1.0),
            ire_offset: overrides.ire_offset.unwrap_or(0.0),
            start_offset: 0,
            pipe_role: PipeRole::None,
        }
    }

    pub fn chroma_agc_enabled(&self) -> bool {
        self.chroma_gain != 1.0 && self.chroma_gain > 0.0
    }

    /// Whether any feature of this channel depends on line/frame timing.
    pub fn needs_timing(&self) -> bool {
        self.is_tbc
            || self.chroma_agc_enabled()
            || self.ire_offset != 0.0
            || self.pipe_role == PipeRole::AudioSync
    }

    fn reads_stdin(&self) -> bool {
        is_stdin(&self.path) || self.combine_path.as_deref().is_some_and(is_stdin)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(self.color, "chroma gain", self.chroma_gain, CHROMA_GAIN_RANGE)?;
        check_range(self.color, "signal gain", self.signal_gain, SIGNAL_GAIN_RANGE)?;
        check_range(self.color, "IRE offset", self.ire_offset, IRE_OFFSET_RANGE)?;

        if self.chroma_gain == 0.0 {
            warn!("({}) : chroma gain 0 disables chroma correction", self.color);
        }
        Ok(())
    }
}

fn check_range(
    color: Color,
    name: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            color,
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub fn is_stdin<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().as_os_str() == "-"
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioConfig {
    pub path: PathBuf,
    pub channel: Color,
    /// Extra bytes skipped in the audio source after the start-frame position.
    pub offset: u64,
}

/// Everything fixed at startup; read-only once channels run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerConfig {
    /// `None` when an explicit rate matches no known standard.
    pub standard: Option<VideoStandard>,
    pub sample_rate: u32,
    pub output_signedness: Signedness,
    pub read_mode: ReadMode,
    pub start_frame: u64,
    pub device_index: u32,
    pub channels: Vec<ChannelConfig>,
    pub audio: Option<AudioConfig>,
}

impl PlayerConfig {
    pub fn channel(&self, color: Color) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.color == color)
    }

    /// Standard used for line/frame bookkeeping.
    pub fn timing_standard(&self) -> VideoStandard {
        self.standard.unwrap_or(VideoStandard::Ntsc)
    }

    /// Fill in start offsets from the start frame and the per-channel frame size.
    ///
    /// Fails when a video or audio start position does not fit in a byte offset.
    pub fn apply_start_frame(&mut self) -> Result<(), ConfigError> {
        let standard = self.timing_standard();
        let start_frame = self.start_frame;
        for channel in &mut self.channels {
            let timing = timing_for(standard, channel.bit_width);
            channel.start_offset = start_frame
                .checked_mul(timing.source_frame_bytes(channel.is_tbc))
                .ok_or(ConfigError::StartFrameOutOfRange {
                    color: channel.color,
                    start_frame,
                })?;
        }

        if let Some(audio) = &self.audio {
            if self.audio_start_offset().is_none() {
                return Err(ConfigError::StartFrameOutOfRange {
                    color: audio.channel,
                    start_frame,
                });
            }
        }
        Ok(())
    }

    /// Byte position of the audio source at the start frame.
    ///
    /// `None` without an audio source or when the position overflows.
    pub fn audio_start_offset(&self) -> Option<u64> {
        let audio = self.audio.as_ref()?;
        let timing = timing_for(self.timing_standard(), BitWidth::Eight);
        self.start_frame
            .checked_mul(timing.audio_frame_bytes as u64)?
            .checked_add(audio.offset)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannel);
        }

        for channel in &self.channels {
            channel.validate()?;
        }

        let mut side_role: Option<Color> = None;
        let mut stdin_reader: Option<Color> = None;
        for channel in &self.channels {
            if channel.pipe_role != PipeRole::None {
                if let Some(first) = side_role {
                    return Err(ConfigError::SideChannelConflict {
                        first,
                        second: channel.color,
                    });
                }
                side_role = Some(channel.color);
            }

            if channel.reads_stdin() {
                if let Some(first) = stdin_reader {
                    return Err(ConfigError::MultipleStdin {
                        first,
                        second: channel.color,
                    });
                }
                stdin_reader = Some(channel.color);
            }

            if self.standard.is_none() && channel.needs_timing() {
                return Err(ConfigError::UnknownStandard {
                    color: channel.color,
                    rate: self.sample_rate,
                });
            }
        }

        let audio_channel = self
            .channels
            .iter()
            .find(|c| c.pipe_role == PipeRole::AudioSync)
            .map(|c| c.color);
        match (&self.audio, audio_channel) {
            (Some(audio), Some(color)) if audio.channel == color => {}
            (Some(audio), _) => {
                if self.channel(audio.channel).is_none() {
                    return Err(ConfigError::InactiveChannel {
                        color: audio.channel,
                    });
                }
                return Err(ConfigError::AudioWithoutChannel);
            }
            (None, Some(color)) => return Err(ConfigError::AudioChannelWithoutSource(color)),
            (None, None) => {}
        }

        if let Some(audio) = &self.audio {
            if is_stdin(&audio.path) {
                if let Some(first) = stdin_reader {
                    return Err(ConfigError::MultipleStdin {
                        first,
                        second: audio.channel,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Resolve the process-wide standard and sample rate.
///
/// A rate that matches a known 4fsc rate decides the standard; otherwise the requested
/// standard (if any) applies. No input at all selects NTSC.
pub fn resolve_standard(
    standard: Option<VideoStandard>,
    rate: Option<u32>,
) -> Result<(Option<VideoStandard>, u32), ConfigError> {
    match (standard, rate) {
        (standard, None) => {
            let standard = standard.unwrap_or(VideoStandard::Ntsc);
            Ok((Some(standard), standard.sample_rate()))
        }
        (requested, Some(rate)) => match (requested, VideoStandard::from_sample_rate(rate)) {
            (Some(requested), Some(inferred)) if requested != inferred => {
                Err(ConfigError::StandardMismatch {
                    rate,
                    standard: requested,
                })
            }
            (requested, inferred) => Ok((inferred.or(requested), rate)),
        },
    }
}

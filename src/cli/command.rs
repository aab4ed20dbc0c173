use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use cvbs::standard::VideoStandard;
use cvbs::structs::config::Color;

use super::settings::{ChannelSetting, parse_color, parse_setting};

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (cvbs ", env!("CVBS_VERSION"), ", built ", env!("BUILD_TIMESTAMP"), ")"
    ),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Stream captured composite video and audio through FL2K-style VGA DACs",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat buffer underruns as fatal errors.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stream the given sources to the DAC.
    Play(PlayArgs),

    /// Print the resolved channel plan without opening the device.
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    #[command(flatten)]
    pub player: PlayerArgs,

    /// Write each transmitted channel stream into this directory.
    #[arg(long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub player: PlayerArgs,
}

/// Sources, per-channel settings and global playback options.
///
/// Per-channel settings take `CHANNEL=VALUE` pairs (`R`, `G` or `B`) and may be repeated.
#[derive(Debug, Args)]
pub struct PlayerArgs {
    /// Red channel source (use "-" for stdin).
    #[arg(short = 'R', long, value_name = "PATH")]
    pub red: Option<PathBuf>,

    /// Green channel source (use "-" for stdin).
    #[arg(short = 'G', long, value_name = "PATH")]
    pub green: Option<PathBuf>,

    /// Blue channel source (use "-" for stdin).
    #[arg(short = 'B', long, value_name = "PATH")]
    pub blue: Option<PathBuf>,

    /// Sample width in bits (8 or 16).
    #[arg(long, value_name = "CHANNEL=BITS", value_parser = parse_setting::<u8>)]
    pub bits: Vec<ChannelSetting<u8>>,

    /// Sample signedness ("signed" or "unsigned").
    #[arg(long, value_name = "CHANNEL=SIGN", value_parser = parse_setting::<SignArg>)]
    pub sign: Vec<ChannelSetting<SignArg>>,

    /// Treat these channels as time-base-corrected captures.
    #[arg(long, value_name = "CHANNEL", num_args = 1.., value_parser = parse_color)]
    pub tbc: Vec<Color>,

    /// Treat these channels as plain captures even if the extension says TBC.
    #[arg(long, value_name = "CHANNEL", num_args = 1.., value_parser = parse_color)]
    pub no_tbc: Vec<Color>,

    /// Second source merged into a channel.
    #[arg(long, value_name = "CHANNEL=PATH", value_parser = parse_setting::<PathBuf>)]
    pub combine: Vec<ChannelSetting<PathBuf>>,

    /// Combine mode: 0 sums the signed samples, 1 averages them.
    #[arg(long, value_name = "CHANNEL=MODE", value_parser = parse_setting::<u8>)]
    pub combine_mode: Vec<ChannelSetting<u8>>,

    /// Chroma gain correction referenced to the colour burst [0, 6]; 1 disables it.
    #[arg(long, value_name = "CHANNEL=GAIN", value_parser = parse_setting::<f64>)]
    pub chroma_gain: Vec<ChannelSetting<f64>>,

    /// Output signal gain [0.5, 2].
    #[arg(long, value_name = "CHANNEL=GAIN", value_parser = parse_setting::<f64>)]
    pub signal_gain: Vec<ChannelSetting<f64>>,

    /// IRE offset of active video [-50, 50].
    #[arg(long, value_name = "CHANNEL=IRE", value_parser = parse_setting::<f64>)]
    pub ire: Vec<ChannelSetting<f64>>,

    /// Video standard [default: ntsc].
    #[arg(long, value_enum)]
    pub standard: Option<StandardArg>,

    /// Explicit DAC sample rate in Hz; a known 4fsc rate selects the standard.
    #[arg(long, value_name = "HZ")]
    pub rate: Option<u32>,

    /// Frame to start playback from.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub start_frame: u64,

    /// Channel scheduling: 0 parallel, 1 R then G+B, 2 R+G then B, 3 sequential.
    #[arg(long, value_name = "MODE", default_value_t = 0)]
    pub read_mode: u8,

    /// 16-bit stereo 44.1 kHz audio interleaved on stdout once per frame.
    #[arg(long, value_name = "PATH")]
    pub audio: Option<PathBuf>,

    /// Channel whose frame starts drive the audio.
    #[arg(long, value_name = "CHANNEL", value_parser = parse_color)]
    pub audio_channel: Option<Color>,

    /// Extra bytes skipped at the start of the audio source.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub audio_offset: u64,

    /// Echo this channel's conditioned output on stdout.
    #[arg(long, value_name = "CHANNEL", value_parser = parse_color)]
    pub pipe: Option<Color>,

    /// Drive the DAC with unsigned samples instead of signed.
    #[arg(long)]
    pub unsigned_output: bool,

    /// Device index.
    #[arg(short = 'd', long, value_name = "INDEX", default_value_t = 0)]
    pub device: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum StandardArg {
    Ntsc,
    Pal,
}

impl From<StandardArg> for VideoStandard {
    fn from(value: StandardArg) -> Self {
        match value {
            StandardArg::Ntsc => VideoStandard::Ntsc,
            StandardArg::Pal => VideoStandard::Pal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignArg {
    Signed,
    Unsigned,
}

impl std::str::FromStr for SignArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "signed" => Ok(SignArg::Signed),
            "u" | "unsigned" => Ok(SignArg::Unsigned),
            other => Err(format!("expected 'signed' or 'unsigned', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

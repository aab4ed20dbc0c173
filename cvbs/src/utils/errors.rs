use std::path::PathBuf;

use crate::standard::VideoStandard;
use crate::structs::config::Color;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("No channel selected: provide at least one of -R, -G, -B")]
    NoChannel,

    #[error("({color}) : {name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        color: Color,
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("({color}) : bit width must be 8 or 16, got {bits}")]
    InvalidBitWidth { color: Color, bits: u8 },

    #[error("Combine mode must be 0 or 1, got {0}")]
    InvalidCombineMode(u8),

    #[error("Read mode must be 0-3, got {0}")]
    InvalidReadMode(u8),

    #[error("Unknown channel '{0}' (expected R, G or B)")]
    UnknownChannel(String),

    #[error("Invalid channel setting '{0}' (expected CHANNEL=VALUE)")]
    InvalidSetting(String),

    #[error("({color}) : setting given for an inactive channel")]
    InactiveChannel { color: Color },

    #[error("Only one channel may hold a side-channel role ({first} and {second} both do)")]
    SideChannelConflict { first: Color, second: Color },

    #[error("Audio source given without an audio sync channel")]
    AudioWithoutChannel,

    #[error("Audio sync channel {0} given without an audio source")]
    AudioChannelWithoutSource(Color),

    #[error("Only one source may read stdin ({first} and {second} both do)")]
    MultipleStdin { first: Color, second: Color },

    #[error("({color}) : sample rate {rate} Hz has no known video standard; pass --standard")]
    UnknownStandard { color: Color, rate: u32 },

    #[error("Sample rate {rate} Hz contradicts the {standard} standard")]
    StandardMismatch { rate: u32, standard: VideoStandard },

    #[error("({color}) : start frame {start_frame} is beyond the addressable range")]
    StartFrameOutOfRange { color: Color, start_frame: u64 },

    #[error("Frame limit {0} is beyond the addressable range")]
    FrameLimitOutOfRange(u64),
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("({color}) : Failed to open {}: {source}", path.display())]
    Open {
        color: Color,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("({color}) : Failed to seek to byte {offset}: {source}")]
    Seek {
        color: Color,
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("({color}) : source exhausted ({read} of {wanted} bytes)")]
    Exhausted {
        color: Color,
        read: usize,
        wanted: usize,
    },

    #[error("({color}) : File Error: {source}")]
    Io {
        color: Color,
        #[source]
        source: std::io::Error,
    },

    #[error("({color}) : side channel write failed: {source}")]
    SideChannel {
        color: Color,
        #[source]
        source: std::io::Error,
    },

    #[error("({color}) : cancelled by shutdown")]
    Cancelled { color: Color },
}

#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open device #{0}")]
    NotFound(u32),

    #[error("Failed to set sample rate {0} Hz")]
    SampleRate(u32),

    #[error("Device error, exiting")]
    Transfer,

    #[error("Device already started")]
    AlreadyStarted,

    #[error("Device write failed: {0}")]
    Io(#[from] std::io::Error),
}

use std::fmt::Display;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitWidth {
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "16")]
    Sixteen,
}

impl BitWidth {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(BitWidth::Eight),
            16 => Some(BitWidth::Sixteen),
            _ => None,
        }
    }

    /// Bytes per sample, which is also the counter stride.
    pub fn bytes(self) -> usize {
        match self {
            BitWidth::Eight => 1,
            BitWidth::Sixteen => 2,
        }
    }
}

impl Display for BitWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitWidth::Eight => write!(f, "8-bit"),
            BitWidth::Sixteen => write!(f, "16-bit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Format defaults inferred from a file extension.
///
/// Every field is a default; explicit overrides replace them before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub bit_width: BitWidth,
    /// `None` leaves signedness to the device sample type.
    pub signedness: Option<Signedness>,
    pub is_tbc: bool,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self {
            bit_width: BitWidth::Eight,
            signedness: None,
            is_tbc: false,
        }
    }
}

impl SampleFormat {
    const fn new(bit_width: BitWidth, signedness: Signedness, is_tbc: bool) -> Self {
        Self {
            bit_width,
            signedness: Some(signedness),
            is_tbc,
        }
    }
}

/// Default format record for a file extension (case-insensitive, without the dot).
pub fn format_for_extension(extension: &str) -> SampleFormat {
    use BitWidth::{Eight, Sixteen};
    use Signedness::{Signed, Unsigned};

    match extension.to_ascii_lowercase().as_str() {
        "tbc" => SampleFormat::new(Sixteen, Unsigned, true),
        "s8" => SampleFormat::new(Eight, Signed, false),
        "u8" | "raw" | "r8" | "efm" => SampleFormat::new(Eight, Unsigned, false),
        "s16" | "wav" | "pcm" | "r16" => SampleFormat::new(Sixteen, Signed, false),
        "u16" => SampleFormat::new(Sixteen, Unsigned, false),
        _ => SampleFormat::default(),
    }
}

/// Default format record for a path; stdin (`-`) and extension-less paths get the default.
pub fn format_for_path<P: AsRef<Path>>(path: P) -> SampleFormat {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(format_for_extension)
        .unwrap_or_default()
}

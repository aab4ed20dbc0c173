use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use cvbs::structs::config::{
    AudioConfig, ChannelConfig, ChannelOverrides, Color, CombineMode, PipeRole, PlayerConfig,
    ReadMode, resolve_standard,
};
use cvbs::structs::format::{BitWidth, Signedness};
use cvbs::utils::errors::ConfigError;

use super::command::{PlayerArgs, SignArg};

/// One `CHANNEL=VALUE` pair from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSetting<T> {
    pub color: Color,
    pub value: T,
}

pub fn parse_color(s: &str) -> Result<Color, String> {
    s.parse::<Color>().map_err(|e| e.to_string())
}

pub fn parse_setting<T>(s: &str) -> Result<ChannelSetting<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let (color, value) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidSetting(s.to_string()).to_string())?;

    Ok(ChannelSetting {
        color: parse_color(color.trim())?,
        value: value
            .trim()
            .parse()
            .map_err(|e: T::Err| format!("{s}: {e}"))?,
    })
}

/// Last value given for `color`, if any.
fn setting_for<T: Clone>(settings: &[ChannelSetting<T>], color: Color) -> Option<T> {
    settings
        .iter()
        .rev()
        .find(|setting| setting.color == color)
        .map(|setting| setting.value.clone())
}

impl PlayerArgs {
    fn source(&self, color: Color) -> Option<&PathBuf> {
        match color {
            Color::Red => self.red.as_ref(),
            Color::Green => self.green.as_ref(),
            Color::Blue => self.blue.as_ref(),
        }
    }

    /// Colors named by any per-channel option.
    fn configured_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.bits
            .iter()
            .map(|s| s.color)
            .chain(self.sign.iter().map(|s| s.color))
            .chain(self.combine.iter().map(|s| s.color))
            .chain(self.combine_mode.iter().map(|s| s.color))
            .chain(self.chroma_gain.iter().map(|s| s.color))
            .chain(self.signal_gain.iter().map(|s| s.color))
            .chain(self.ire.iter().map(|s| s.color))
            .chain(self.tbc.iter().copied())
            .chain(self.no_tbc.iter().copied())
            .chain(self.pipe)
    }

    fn overrides(&self, color: Color) -> Result<ChannelOverrides, ConfigError> {
        let bit_width = setting_for(&self.bits, color)
            .map(|bits| {
                BitWidth::from_bits(bits).ok_or(ConfigError::InvalidBitWidth { color, bits })
            })
            .transpose()?;

        let is_tbc = if self.no_tbc.contains(&color) {
            Some(false)
        } else if self.tbc.contains(&color) {
            Some(true)
        } else {
            None
        };

        Ok(ChannelOverrides {
            bit_width,
            signedness: setting_for(&self.sign, color).map(|sign| match sign {
                SignArg::Signed => Signedness::Signed,
                SignArg::Unsigned => Signedness::Unsigned,
            }),
            is_tbc,
            combine_path: setting_for(&self.combine, color),
            combine_mode: setting_for(&self.combine_mode, color)
                .map(CombineMode::from_index)
                .transpose()?,
            chroma_gain: setting_for(&self.chroma_gain, color),
            signal_gain: setting_for(&self.signal_gain, color),
            ire_offset: setting_for(&self.ire, color),
        })
    }

    /// Resolve the command line into a validated [`PlayerConfig`].
    pub fn player_config(&self) -> Result<PlayerConfig> {
        let (standard, sample_rate) = resolve_standard(self.standard.map(Into::into), self.rate)?;
        let output_signedness = if self.unsigned_output {
            Signedness::Unsigned
        } else {
            Signedness::Signed
        };

        if let Some(color) = self.configured_colors().find(|c| self.source(*c).is_none()) {
            return Err(ConfigError::InactiveChannel { color }.into());
        }

        let mut channels = Vec::new();
        for color in Color::ALL {
            let Some(path) = self.source(color) else {
                continue;
            };
            let mut channel =
                ChannelConfig::resolve(color, path, self.overrides(color)?, output_signedness);

            if self.pipe == Some(color) {
                channel.pipe_role = PipeRole::RawEcho;
            }
            if self.audio.is_some() && self.audio_channel == Some(color) {
                if channel.pipe_role != PipeRole::None {
                    return Err(ConfigError::SideChannelConflict {
                        first: color,
                        second: color,
                    }
                    .into());
                }
                channel.pipe_role = PipeRole::AudioSync;
            }
            channels.push(channel);
        }

        let audio = match (&self.audio, self.audio_channel) {
            (Some(path), Some(channel)) => Some(AudioConfig {
                path: path.clone(),
                channel,
                offset: self.audio_offset,
            }),
            (Some(_), None) => return Err(ConfigError::AudioWithoutChannel.into()),
            (None, Some(color)) => {
                return Err(ConfigError::AudioChannelWithoutSource(color).into());
            }
            (None, None) => None,
        };

        let mut config = PlayerConfig {
            standard,
            sample_rate,
            output_signedness,
            read_mode: ReadMode::from_index(self.read_mode)?,
            start_frame: self.start_frame,
            device_index: self.device,
            channels,
            audio,
        };
        config.apply_start_frame()?;
        config.validate()?;

        Ok(config)
    }
}

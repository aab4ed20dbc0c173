use std::path::Path;

use anyhow::Result;
use cvbs::process::BUF_LEN;
use cvbs::process::orchestrate::stages;
use cvbs::process::skip::bytes_to_skip;
use cvbs::standard::{Timing, VideoStandard, timing_for};
use cvbs::structs::config::{ChannelConfig, Color, PlayerConfig, ReadMode};
use cvbs::structs::format::{BitWidth, Signedness};
use cvbs::utils::device::buffer_period;
use serde::Serialize;

use super::command::InfoArgs;
use super::play::progress::source_frames;

pub fn cmd_info(args: &InfoArgs) -> Result<()> {
    let config = args.player.player_config()?;
    log::info!("Resolved {} channel(s)", config.channels.len());

    print!("{}", serde_yaml_ng::to_string(&PlayerPlan::new(&config))?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct PlayerPlan<'a> {
    standard: Option<VideoStandard>,
    sample_rate: u32,
    output: Signedness,
    read_mode: ReadMode,
    stages: Vec<Vec<Color>>,
    buffer_len: usize,
    buffer_period_ms: f64,
    start_frame: u64,
    channels: Vec<ChannelPlan<'a>>,
    audio: Option<AudioPlan<'a>>,
}

#[derive(Debug, Serialize)]
struct ChannelPlan<'a> {
    #[serde(flatten)]
    config: &'a ChannelConfig,
    timing: Timing,
    /// TBC bytes discarded while filling the first buffer.
    first_buffer_skip: Option<u64>,
    frames_available: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AudioPlan<'a> {
    path: &'a Path,
    channel: Color,
    start_offset: u64,
    frame_bytes: u32,
}

impl<'a> PlayerPlan<'a> {
    fn new(config: &'a PlayerConfig) -> Self {
        let standard = config.timing_standard();

        let stages = stages(config.read_mode)
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .copied()
                    .filter(|color| config.channel(*color).is_some())
                    .collect::<Vec<_>>()
            })
            .filter(|stage| !stage.is_empty())
            .collect();

        let channels = config
            .channels
            .iter()
            .map(|channel| {
                let timing = timing_for(standard, channel.bit_width);
                let buffer_bytes = (BUF_LEN * channel.bit_width.bytes()) as u64;
                ChannelPlan {
                    config: channel,
                    timing,
                    first_buffer_skip: channel.is_tbc.then(|| {
                        bytes_to_skip(0, timing.line_length, timing.frame_length, buffer_bytes)
                    }),
                    frames_available: source_frames(channel, standard),
                }
            })
            .collect();

        let audio = config.audio.as_ref().map(|audio| AudioPlan {
            path: &audio.path,
            channel: audio.channel,
            start_offset: config.audio_start_offset().unwrap_or(audio.offset),
            frame_bytes: timing_for(standard, BitWidth::Eight).audio_frame_bytes,
        });

        Self {
            standard: config.standard,
            sample_rate: config.sample_rate,
            output: config.output_signedness,
            read_mode: config.read_mode,
            stages,
            buffer_len: BUF_LEN,
            buffer_period_ms: buffer_period(config.sample_rate).as_secs_f64() * 1000.0,
            start_frame: config.start_frame,
            channels,
            audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvbs::structs::config::AudioConfig;

    fn config() -> PlayerConfig {
        let mut red = ChannelConfig::for_path(Color::Red, "-");
        red.pipe_role = cvbs::structs::config::PipeRole::AudioSync;
        PlayerConfig {
            standard: Some(VideoStandard::Ntsc),
            sample_rate: VideoStandard::Ntsc.sample_rate(),
            output_signedness: Signedness::Signed,
            read_mode: ReadMode::RedFirst,
            start_frame: 1,
            device_index: 0,
            channels: vec![
                red,
                ChannelConfig::for_path(Color::Blue, "missing-blue.tbc"),
            ],
            audio: Some(AudioConfig {
                path: "audio.pcm".into(),
                channel: Color::Red,
                offset: 4,
            }),
        }
    }

    #[test]
    fn plan_drops_inactive_channels_from_stages() {
        let config = config();
        let plan = PlayerPlan::new(&config);
        assert_eq!(plan.stages, vec![vec![Color::Red], vec![Color::Blue]]);
        assert_eq!(plan.channels[0].first_buffer_skip, None);
        assert_eq!(plan.channels[1].first_buffer_skip, Some(2 * 1820));
        assert_eq!(plan.channels[1].frames_available, None);
        assert_eq!(plan.audio.as_ref().map(|a| a.start_offset), Some(5884 + 4));
    }

    #[test]
    fn plan_serializes_to_yaml() -> Result<()> {
        let config = config();
        let yaml = serde_yaml_ng::to_string(&PlayerPlan::new(&config))?;

        assert!(yaml.contains("read_mode: red-first"));
        assert!(yaml.contains("standard: ntsc"));
        assert!(yaml.contains("frame_length: 955500"));
        assert!(yaml.contains("pipe_role: audio-sync"));
        Ok(())
    }
}

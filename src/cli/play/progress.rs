use anyhow::Result;
use cvbs::standard::{VideoStandard, timing_for};
use cvbs::structs::config::{ChannelConfig, PlayerConfig, is_stdin};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Whole frames left in `channel`'s source after its start offset.
///
/// `None` for stdin or when the file size cannot be read.
pub fn source_frames(channel: &ChannelConfig, standard: VideoStandard) -> Option<u64> {
    if is_stdin(&channel.path) {
        return None;
    }

    let len = std::fs::metadata(&channel.path).ok()?.len();
    let frame_bytes = timing_for(standard, channel.bit_width).source_frame_bytes(channel.is_tbc);
    Some(len.saturating_sub(channel.start_offset) / frame_bytes)
}

/// Frames until the longest-running channel is exhausted.
pub fn estimate_total_frames(config: &PlayerConfig) -> Option<u64> {
    let standard = config.timing_standard();
    let frames = config
        .channels
        .iter()
        .filter_map(|channel| source_frames(channel, standard))
        .max();

    if let Some(frames) = frames {
        log::debug!("Sources hold {frames} frames from frame {}", config.start_frame);
    }
    frames
}

pub fn create_progress_bar(
    multi: &MultiProgress,
    total_frames: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb
    };

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message("waiting for device");
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvbs::structs::config::Color;

    #[test]
    fn counts_frames_left_after_start() -> Result<()> {
        let path = std::env::temp_dir().join(format!("cvbsd-progress-{}.u8", std::process::id()));
        std::fs::write(&path, vec![0u8; 477_750 * 3 + 100])?;

        let mut channel = ChannelConfig::for_path(Color::Red, &path);
        assert_eq!(source_frames(&channel, VideoStandard::Ntsc), Some(3));

        channel.start_offset = 477_750;
        assert_eq!(source_frames(&channel, VideoStandard::Ntsc), Some(2));

        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn stdin_has_no_estimate() {
        let channel = ChannelConfig::for_path(Color::Red, "-");
        assert_eq!(source_frames(&channel, VideoStandard::Pal), None);
    }
}

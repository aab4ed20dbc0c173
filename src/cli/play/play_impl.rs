use super::fill_thread::{FillEnd, FillSummary, FillThreadConfig, spawn_fill_thread};
use super::progress::{create_progress_bar, estimate_total_frames};
use crate::cli::command::{Cli, PlayArgs};
use crate::device::EmulatedDevice;
use crate::timestamp::{frame_time, time_str};
use anyhow::Result;
use cvbs::process::BUF_LEN;
use cvbs::process::orchestrate::{ChannelOrchestrator, FillReport};
use cvbs::standard::timing_for;
use cvbs::structs::config::Color;
use cvbs::structs::format::{BitWidth, Signedness};
use cvbs::utils::device::{DeviceSink, PullCallback, PullRequest, buffer_period};
use cvbs::utils::errors::{ConfigError, DeviceError};
use indicatif::{MultiProgress, ProgressBar};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters shared between the device callback and the main loop.
#[derive(Debug, Default)]
struct PlaybackStats {
    buffers: AtomicU64,
    underruns: AtomicU64,
    device_failed: AtomicBool,
    /// The fill thread is gone and every queued buffer set was handed to the device.
    drained: AtomicBool,
}

pub fn cmd_play(args: &PlayArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let config = args.player.player_config()?;
    let standard = config.timing_standard();
    let output_signed = config.output_signedness == Signedness::Signed;

    log::info!(
        "Playing {} at {} Hz ({} output, read mode {:?}, start frame {})",
        standard,
        config.sample_rate,
        if output_signed { "signed" } else { "unsigned" },
        config.read_mode,
        config.start_frame
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    let orchestrator = ChannelOrchestrator::from_config(&config, shutdown.clone())?;

    let mut device = EmulatedDevice::open(config.device_index)?;
    let rate = device.set_sample_rate(config.sample_rate)?;
    device.set_sample_signed(output_signed);
    if let Some(dir) = &args.dump {
        device.dump_to(dir)?;
    }

    // Output samples per frame, independent of source width
    let frame_samples = timing_for(standard, BitWidth::Eight).frame_length as u64;
    let buffer_limit = args
        .frames
        .map(|frames| buffers_for_frames(frames, frame_samples))
        .transpose()?;

    let total_frames = args.frames.or_else(|| estimate_total_frames(&config));
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_frames)?),
        None => None,
    };

    let (tx, rx) = mpsc::sync_channel(1);
    let fill_thread = spawn_fill_thread(FillThreadConfig {
        orchestrator,
        tx,
        shutdown: shutdown.clone(),
        buffer_limit,
    });

    let stats = Arc::new(PlaybackStats::default());
    let callback = pull_callback(
        rx,
        buffer_period(rate),
        stats.clone(),
        shutdown.clone(),
        cli.strict,
    );
    device.start(callback)?;

    let start_time = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
        if let Some(pb) = &pb {
            update_progress(pb, &stats, frame_samples, standard.frame_rate());
        }
    }

    wait_for_drain(&stats, buffer_period(rate));

    log::info!("Stopping playback");
    let closed = device.close();

    let summary = match fill_thread.join() {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            if let Some(pb) = &pb {
                pb.abandon_with_message("playback failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = &pb {
                pb.abandon_with_message("fill thread panicked");
            }
            return Err(anyhow::anyhow!("Fill thread panicked"));
        }
    };
    closed?;

    finish(&pb, &stats, &summary, frame_samples, standard.frame_rate(), start_time);

    if stats.device_failed.load(Ordering::SeqCst) {
        return Err(DeviceError::Transfer.into());
    }
    if summary.end == FillEnd::Exhausted {
        anyhow::bail!("All channels exhausted after {} buffers", summary.fills);
    }
    Ok(())
}

/// Hand one prepared buffer set to the device per pull.
///
/// Waits at most one buffer period; a miss leaves the pull empty and counts as an underrun.
fn pull_callback(
    rx: mpsc::Receiver<FillReport>,
    period: Duration,
    stats: Arc<PlaybackStats>,
    shutdown: Arc<AtomicBool>,
    strict: bool,
) -> PullCallback {
    Box::new(move |request: &mut PullRequest| {
        if request.device_error {
            log::error!("Device error, exiting");
            stats.device_failed.store(true, Ordering::SeqCst);
            shutdown.store(true, Ordering::SeqCst);
            return;
        }

        match rx.recv_timeout(period) {
            Ok(mut report) => {
                for color in Color::ALL {
                    if let Some(buffer) = report.take_buffer(color) {
                        request.set_buffer(color, buffer);
                    }
                }
                stats.buffers.fetch_add(1, Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => {
                let underruns = stats.underruns.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("Buffer underrun ({underruns} so far)");
                if strict {
                    log::error!("Underrun in strict mode, exiting");
                    shutdown.store(true, Ordering::SeqCst);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                stats.drained.store(true, Ordering::SeqCst);
                shutdown.store(true, Ordering::SeqCst);
            }
        }
    })
}

/// Buffer sets that cover `frames` whole frames.
fn buffers_for_frames(frames: u64, frame_samples: u64) -> Result<u64, ConfigError> {
    frames
        .checked_mul(frame_samples)
        .map(|samples| samples.div_ceil(BUF_LEN as u64))
        .ok_or(ConfigError::FrameLimitOutOfRange(frames))
}

/// Let the device pull whatever the fill thread queued before it stopped.
fn wait_for_drain(stats: &PlaybackStats, period: Duration) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while !stats.drained.load(Ordering::SeqCst) && !stats.device_failed.load(Ordering::SeqCst) {
        if Instant::now() >= deadline {
            log::warn!("Queued buffers not drained within {DRAIN_TIMEOUT:?}");
            return;
        }
        thread::sleep(period);
    }
}

fn streamed_frames(stats: &PlaybackStats, frame_samples: u64) -> u64 {
    stats.buffers.load(Ordering::Relaxed) * BUF_LEN as u64 / frame_samples
}

fn update_progress(pb: &ProgressBar, stats: &PlaybackStats, frame_samples: u64, frame_rate: f64) {
    let frames = streamed_frames(stats, frame_samples);
    pb.set_position(frames);
    pb.set_message(format!(
        "timestamp: {} | underruns: {}",
        time_str(frame_time(frames, frame_rate)),
        stats.underruns.load(Ordering::Relaxed)
    ));
}

fn finish(
    pb: &Option<ProgressBar>,
    stats: &PlaybackStats,
    summary: &FillSummary,
    frame_samples: u64,
    frame_rate: f64,
    start_time: Instant,
) {
    let frames = streamed_frames(stats, frame_samples);
    let position = time_str(frame_time(frames, frame_rate));
    let underruns = stats.underruns.load(Ordering::Relaxed);

    if let Some(pb) = pb {
        pb.set_position(frames);
        pb.finish_with_message(format!("timestamp: {position} | underruns: {underruns}"));
    }

    log::info!(
        "Streamed {} of {} prepared buffer sets ({frames} frames, {position}) in {:.1}s, {underruns} underruns",
        stats.buffers.load(Ordering::Relaxed),
        summary.fills,
        start_time.elapsed().as_secs_f64()
    );
}

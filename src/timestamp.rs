use std::time::Duration;

/// Format a playback position as `HH:MM:SS.mmm`; hours widen past 99.
pub fn time_str(position: Duration) -> String {
    let ms = position.as_millis();
    let hours = ms / 3_600_000;
    let minutes = ms % 3_600_000 / 60_000;
    let seconds = ms % 60_000 / 1_000;
    let millis = ms % 1_000;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Playback position after `frames` frames at `frame_rate`.
pub fn frame_time(frames: u64, frame_rate: f64) -> Duration {
    Duration::from_secs_f64(frames as f64 / frame_rate)
}

#[test]
fn formats_positions() {
    assert_eq!(time_str(Duration::from_millis(0)), "00:00:00.000");
    assert_eq!(time_str(Duration::from_millis(3_723_004)), "01:02:03.004");
    assert_eq!(time_str(Duration::from_secs(100 * 3600)), "100:00:00.000");
}

#[test]
fn pal_frames_to_time() {
    assert_eq!(time_str(frame_time(50, 25.0)), "00:00:02.000");
}

/// Bytes of extra TBC lines that fall inside the next `buffer_size` source bytes.
///
/// `sample_cnt` is the frame-relative position before the fill. Every frame boundary
/// reached with data still left to read costs one `line_length`, including a final
/// boundary only partly covered by the buffer.
pub fn bytes_to_skip(
    sample_cnt: u32,
    line_length: u32,
    frame_length: u32,
    buffer_size: u64,
) -> u64 {
    if frame_length == 0 {
        return 0;
    }

    let to_boundary = frame_length.saturating_sub(sample_cnt) as i64;
    let mut remaining = buffer_size as i64 - to_boundary;
    let mut skip_count = 0u64;

    while remaining > 0 {
        skip_count += 1;
        remaining -= frame_length as i64;
    }

    skip_count * line_length as u64
}

/// Split `data` into frames of at most `max` bytes.
///
/// Every frame but the last is exactly `max` bytes long and the frames
/// concatenate back to `data`. Empty input yields no frames.
///
/// # Panics
///
/// Panics if `max` is zero.
pub fn chunk(data: &[u8], max: usize) -> std::slice::Chunks<'_, u8> {
    assert!(max > 0, "frame size must be non-zero");
    data.chunks(max)
}

/// Number of frames [`chunk`] yields for `len` bytes.
pub fn frame_count(len: usize, max: usize) -> usize {
    assert!(max > 0, "frame size must be non-zero");
    len.div_ceil(max)
}

//! Marker-based JPEG frame extraction from an unstructured byte buffer.

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Find the newest complete JPEG frame in `buf`.
///
/// Returns the frame span plus the offset at which unconsumed trailing data
/// begins, or `None` when no complete frame has accumulated yet (in which
/// case the caller must keep the buffer intact and append more bytes).
///
/// Selection works backward from the end: the last EOI marker closes the
/// newest complete frame, and the last SOI before it opens it. When several
/// complete frames sit in the buffer, everything before the newest one is
/// consumed without ever being decoded — a deliberate latest-frame-wins
/// drop, not a bug. A trailing partial frame (SOI with no EOI yet) is left
/// in the unconsumed tail so later chunks can complete it.
pub fn extract_latest_frame(buf: &[u8]) -> Option<(&[u8], usize)> {
    let eoi = rfind(buf, &EOI)?;
    let soi = rfind(&buf[..eoi], &SOI)?;
    Some((&buf[soi..eoi + 2], eoi + 2))
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == needle)
}

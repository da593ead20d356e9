//! Shared state between the producer thread and the capture loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use image::RgbImage;

/// A decoded camera frame plus the moment it was published.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: SystemTime,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: SystemTime::now(),
        }
    }

    /// Decode a JPEG byte span into a frame.
    ///
    /// Marker-delimited spans cut out of the stream buffer can still be
    /// corrupt inside, so decode failures are an expected input condition,
    /// not a bug.
    pub fn from_jpeg(bytes: &[u8]) -> crate::Result<Self> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(crate::StreamError::Decode)?;
        Ok(Self::new(image.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Single-slot cell holding the most recently decoded frame.
///
/// One writer (the stream reader) and one reader (the capture loop) share
/// it. Writes replace the held frame unconditionally; a stale unread frame
/// is simply discarded. Reads clone the frame out so the caller can keep
/// using it after the lock is released. The lock is held only for the
/// clone/replace, never across I/O or decode work.
pub struct FrameSlot {
    cell: Mutex<Option<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// Replace the held frame. The latest write always wins.
    pub fn publish(&self, frame: Frame) {
        // The cell holds a whole frame or none at every instruction
        // boundary, so a poisoned lock can be recovered safely.
        let mut guard = self.cell.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(frame);
    }

    /// Clone out the most recent frame, or `None` if nothing was published.
    pub fn latest(&self) -> Option<Frame> {
        let guard = self.cell.lock().unwrap_or_else(|p| p.into_inner());
        guard.clone()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by both pipeline threads: the frame slot plus the one-way
/// running flag that is the sole shutdown signal.
///
/// The flag starts `true` and never returns to `true` once cleared. Both
/// threads poll it at the top of each loop iteration.
pub struct PipelineContext {
    pub slot: FrameSlot,
    running: AtomicBool,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            slot: FrameSlot::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal both threads to stop. Idempotent.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_empty() {
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());
    }

    #[test]
    fn latest_write_wins() {
        let slot = FrameSlot::new();
        slot.publish(Frame::new(RgbImage::from_pixel(2, 2, image::Rgb([1, 1, 1]))));
        slot.publish(Frame::new(RgbImage::from_pixel(2, 2, image::Rgb([9, 9, 9]))));
        let got = slot.latest().unwrap();
        assert_eq!(got.image.get_pixel(0, 0).0, [9, 9, 9]);
    }

    #[test]
    fn read_copy_is_independent_of_later_writes() {
        let slot = FrameSlot::new();
        slot.publish(Frame::new(RgbImage::from_pixel(2, 2, image::Rgb([5, 5, 5]))));
        let copy = slot.latest().unwrap();
        slot.publish(Frame::new(RgbImage::from_pixel(2, 2, image::Rgb([7, 7, 7]))));
        assert_eq!(copy.image.get_pixel(1, 1).0, [5, 5, 5]);
    }

    #[test]
    fn frame_reports_its_dimensions() {
        let frame = Frame::new(RgbImage::new(320, 240));
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
    }

    #[test]
    fn marker_valid_garbage_fails_decode_without_panicking() {
        // Correct SOI/EOI markers around bytes that are not a JPEG body.
        let mut span = vec![0xFF, 0xD8];
        span.extend(std::iter::repeat(0xAB).take(64));
        span.extend([0xFF, 0xD9]);
        let err = Frame::from_jpeg(&span).unwrap_err();
        assert!(matches!(err, crate::StreamError::Decode(_)));
    }

    #[test]
    fn shutdown_is_one_way() {
        let ctx = PipelineContext::new();
        assert!(ctx.is_running());
        ctx.shutdown();
        ctx.shutdown();
        assert!(!ctx.is_running());
    }
}

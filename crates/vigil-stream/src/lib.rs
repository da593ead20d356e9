// vigil-stream/src/lib.rs
// ============================================================
// vigil-stream – MJPEG ingestion layer for Vigil
// Pulls a chunked HTTP byte stream from a network camera,
// reassembles JPEG frames out of it, and keeps the freshest
// decoded frame in a shared slot for the capture loop.
// ------------------------------------------------------------
// Public API:
//   * extract_latest_frame() – pure marker-based demuxer
//   * FrameSlot / PipelineContext – producer/consumer contract
//   * reader::spawn() – start the producer thread
// ============================================================

//! Vigil – stream ingestion layer
//!
//! The camera exposes a single long-lived HTTP response whose body is a
//! concatenation of independently decodable JPEG images with no length
//! framing. The producer thread started by [`reader::spawn`] appends
//! received chunks to a byte buffer, cuts the newest complete frame out of
//! it with [`extract_latest_frame`], decodes it, and publishes the result
//! into the [`FrameSlot`] owned by the shared [`PipelineContext`].
//!
//! Only the most recent frame is ever retained; older frames that pile up
//! while the consumer is busy are dropped on purpose.

use thiserror::Error;

mod demux;
mod slot;
pub mod reader;

pub use demux::{extract_latest_frame, EOI, SOI};
pub use reader::ReaderConfig;
pub use slot::{Frame, FrameSlot, PipelineContext};

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to connect to camera stream: {0}")]
    Connect(#[source] Box<ureq::Error>),
    #[error("camera stream returned status {0}")]
    Status(u16),
    #[error("stream read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[source] image::ImageError),
}

pub type Result<T> = std::result::Result<T, StreamError>;

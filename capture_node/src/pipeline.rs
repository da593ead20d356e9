//! The consumer side of the pipeline: sample the freshest frame, run
//! detection, publish a summary, clean up.
//!
//! Frame-local failures (detection, publish, artifact removal) are logged
//! and swallowed; anything that escapes an iteration clears the running
//! flag and takes the whole pipeline down with it.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use log::{error, info, warn};

use vigil_detect::Detector;
use vigil_store::{CaptureRecord, StoreClient, StoreError};
use vigil_stream::{Frame, PipelineContext};

/// Retry cadence while the producer has not published anything yet.
const NO_FRAME_RETRY: Duration = Duration::from_millis(200);

/// Publish seam, so the loop can be exercised without a remote store.
pub trait Publish {
    fn publish(&self, record: &CaptureRecord) -> Result<(), StoreError>;
}

impl Publish for StoreClient {
    fn publish(&self, record: &CaptureRecord) -> Result<(), StoreError> {
        StoreClient::publish(self, record)
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Directory for the transient per-frame JPEG artifacts.
    pub save_dir: PathBuf,
    pub capture_interval: Duration,
    pub device_id: String,
}

enum Tick {
    NoFrame,
    Processed,
}

/// Run until the running flag clears. Never panics; an iteration error is
/// promoted to a full shutdown.
pub fn run_capture_loop<D: Detector, P: Publish>(
    ctx: &PipelineContext,
    detector: &mut D,
    publisher: &P,
    opts: &CaptureOptions,
) {
    let mut frame_count: u64 = 0;

    while ctx.is_running() {
        match tick(ctx, detector, publisher, opts, &mut frame_count) {
            Ok(Tick::NoFrame) => {
                info!("no frame available yet");
                std::thread::sleep(NO_FRAME_RETRY);
            }
            Ok(Tick::Processed) => std::thread::sleep(opts.capture_interval),
            Err(e) => {
                error!("capture loop error, shutting down: {e:#}");
                ctx.shutdown();
            }
        }
    }
}

fn tick<D: Detector, P: Publish>(
    ctx: &PipelineContext,
    detector: &mut D,
    publisher: &P,
    opts: &CaptureOptions,
    frame_count: &mut u64,
) -> anyhow::Result<Tick> {
    let frame = match ctx.slot.latest() {
        Some(frame) => frame,
        None => return Ok(Tick::NoFrame),
    };

    let now = chrono::Local::now();
    let image_name = format!(
        "frame_{}_{}.jpg",
        frame_count,
        now.format("%Y%m%d_%H%M%S")
    );
    let path = opts.save_dir.join(&image_name);

    let jpeg = encode_jpeg(&frame)?;
    fs::write(&path, &jpeg).with_context(|| format!("saving {}", path.display()))?;
    info!(
        "saved latest frame: {} ({}x{})",
        path.display(),
        frame.width(),
        frame.height()
    );

    // A failed detection is zero detections, never a dead loop.
    let detections = detector.detect(&frame.image).unwrap_or_else(|e| {
        warn!("detection failed, treating as zero detections: {e}");
        Vec::new()
    });
    info!("number of objects detected: {}", detections.len());

    let classes: BTreeSet<String> = detections.iter().map(|d| d.class.clone()).collect();
    let record = CaptureRecord {
        timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        image_name: image_name.clone(),
        device_id: opts.device_id.clone(),
        has_detections: !detections.is_empty(),
        detected_count: detections.len() as i64,
        classes: classes.into_iter().collect(),
        image_base64: BASE64.encode(&jpeg),
    };

    match publisher.publish(&record) {
        Ok(()) => info!("processed and uploaded {image_name}"),
        Err(e) => warn!("failed to upload {image_name}: {e}"),
    }

    // The artifact goes away no matter how the publish went.
    if let Err(e) = fs::remove_file(&path) {
        warn!("could not remove {}: {e}", path.display());
    }

    *frame_count += 1;
    Ok(Tick::Processed)
}

fn encode_jpeg(frame: &Frame) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    frame
        .image
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Jpeg)
        .context("encoding frame to jpeg")?;
    Ok(out)
}

/// Best-effort bounded join: poll until the thread finishes or the window
/// closes. Returns `false` when the window closes first; the process exits
/// anyway.
pub fn join_within(handle: JoinHandle<()>, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !handle.is_finished() {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    handle.join().is_ok()
}

//! Vigil capture node: pulls the camera's MJPEG stream on a producer
//! thread, and on a fixed cadence detects objects in the freshest frame
//! and publishes a summary document to the remote store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use vigil_detect::OrtYolo;
use vigil_store::{StoreClient, StoreConfig};
use vigil_stream::{reader, PipelineContext, ReaderConfig};

mod pipeline;

use pipeline::CaptureOptions;

/// How long shutdown waits for the producer thread before exiting anyway.
const READER_JOIN_LIMIT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "capture_node", about = "MJPEG capture, detection and publish pipeline")]
struct Args {
    /// Camera MJPEG endpoint.
    #[arg(long, env = "STREAM_URL", default_value = "http://172.20.10.3:81/stream")]
    stream_url: String,

    /// Directory for transient per-frame artifacts.
    #[arg(long, env = "SAVE_DIR", default_value = "captured_images")]
    save_dir: PathBuf,

    /// Delay between processed captures, in milliseconds.
    #[arg(long, env = "CAPTURE_INTERVAL_MS", default_value_t = 2000)]
    capture_interval_ms: u64,

    /// Minimum detection confidence. Kept permissive: the upscaled camera
    /// feed is noisy.
    #[arg(long, env = "CONF_THRESHOLD", default_value_t = vigil_detect::DEFAULT_CONF_THRESHOLD)]
    conf_threshold: f32,

    /// Path to the YOLO ONNX model.
    #[arg(long, env = "MODEL_PATH", default_value = "models/yolov10m.onnx")]
    model: String,

    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    project_id: String,

    #[arg(long, env = "FIREBASE_API_KEY")]
    api_key: Option<String>,

    #[arg(long, env = "STORE_COLLECTION", default_value = "IOT")]
    collection: String,

    #[arg(long, env = "DEVICE_ID", default_value = "ESP32-CAM-01")]
    device_id: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    fs::create_dir_all(&args.save_dir)
        .with_context(|| format!("creating save dir {}", args.save_dir.display()))?;

    let mut detector = OrtYolo::new(&args.model, args.conf_threshold)
        .with_context(|| format!("loading model {}", args.model))?;

    let mut store_config = StoreConfig::new(&args.project_id, &args.collection);
    store_config.api_key = args.api_key.clone();
    let store = StoreClient::new(store_config).context("building store client")?;

    let ctx = Arc::new(PipelineContext::new());
    {
        let ctx = Arc::clone(&ctx);
        ctrlc::set_handler(move || {
            info!("interrupt received, shutting down");
            ctx.shutdown();
        })
        .context("installing interrupt handler")?;
    }

    let reader_handle = reader::spawn(Arc::clone(&ctx), ReaderConfig::new(&args.stream_url));

    let opts = CaptureOptions {
        save_dir: args.save_dir.clone(),
        capture_interval: Duration::from_millis(args.capture_interval_ms),
        device_id: args.device_id.clone(),
    };
    info!("automatic frame capture started, press Ctrl+C to stop");
    pipeline::run_capture_loop(&ctx, &mut detector, &store, &opts);

    ctx.shutdown();
    if !pipeline::join_within(reader_handle, READER_JOIN_LIMIT) {
        warn!("stream reader did not stop within the join window, exiting anyway");
    }
    info!("image capture and processing completed");
    Ok(())
}

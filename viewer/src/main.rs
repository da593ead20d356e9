//! Vigil terminal viewer: polls the document store for the newest capture
//! and renders a summary, including a traffic-level classification derived
//! from the detected object count.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use log::warn;

use vigil_store::{CaptureRecord, StoreClient, StoreConfig};

mod traffic;

use traffic::TrafficLevel;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

#[derive(Parser, Debug)]
#[command(name = "viewer", about = "Terminal viewer for Vigil capture documents")]
struct Args {
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    project_id: String,

    #[arg(long, env = "FIREBASE_API_KEY")]
    api_key: Option<String>,

    #[arg(long, env = "STORE_COLLECTION", default_value = "IOT")]
    collection: String,

    /// Refresh cadence in seconds.
    #[arg(long, default_value_t = 1)]
    refresh_secs: u64,

    /// Where the most recent carried image is written.
    #[arg(long, default_value = "latest_capture.jpg")]
    image_out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = StoreConfig::new(&args.project_id, &args.collection);
    config.api_key = args.api_key.clone();
    let client = StoreClient::new(config).context("building store client")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing interrupt handler")?;
    }

    while running.load(Ordering::SeqCst) {
        match client.fetch_latest() {
            Ok(Some(record)) => display(&record, &args.image_out),
            Ok(None) => println!("No documents found in collection yet."),
            Err(e) => warn!("could not fetch latest document: {e}"),
        }
        std::thread::sleep(Duration::from_secs(args.refresh_secs));
    }

    println!("\nViewer terminated.");
    Ok(())
}

fn display(record: &CaptureRecord, image_out: &PathBuf) {
    // Clear screen, cursor home.
    print!("\x1b[2J\x1b[H");

    println!("{BOLD}===== Vigil Data Viewer ====={RESET}");
    println!(
        "{BOLD}Last Updated: {}{RESET}",
        chrono::Local::now().format("%H:%M:%S")
    );
    println!("{}", "=".repeat(30));

    println!("{BOLD}Device Information:{RESET}");
    println!("  Device ID: {}", record.device_id);
    println!("  Timestamp: {}", record.timestamp);
    println!("  Detected Count: {}", record.detected_count);
    println!("  Has Detections: {}", record.has_detections);
    println!("  Image Name: {}", record.image_name);
    if !record.classes.is_empty() {
        println!("  Classes: {}", record.classes.join(", "));
    }
    println!("{}", "-".repeat(30));

    let level = TrafficLevel::from_count(record.detected_count);
    println!(
        "{BOLD}Traffic Status:{RESET} {}{}{RESET}",
        level.color(),
        level.label()
    );

    if record.image_base64.is_empty() {
        println!("\nNo image data available");
    } else {
        match BASE64.decode(&record.image_base64) {
            Ok(bytes) => match std::fs::write(image_out, bytes) {
                Ok(()) => println!("\nImage saved as: {}", image_out.display()),
                Err(e) => warn!("could not write {}: {e}", image_out.display()),
            },
            Err(e) => warn!("carried image is not valid base64: {e}"),
        }
    }

    println!("{}", "=".repeat(30));
}

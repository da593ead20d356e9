//! Producer thread: camera connection, chunked reads, frame publication.

use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::demux::extract_latest_frame;
use crate::slot::{Frame, PipelineContext};
use crate::{Result, StreamError};

/// Read granularity for the stream body. The camera trickles bytes, so
/// small reads keep frame latency low.
const CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// MJPEG endpoint, e.g. `http://172.20.10.3:81/stream`.
    pub url: String,
    pub connect_timeout: Duration,
    /// Upper bound on a single blocking receive. A stall longer than this
    /// is treated as a dead connection.
    pub read_timeout: Duration,
}

impl ReaderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Start the producer thread.
///
/// The thread runs until the running flag clears or the connection fails,
/// and clears the flag itself on the way out, so a dead producer always
/// shuts the whole pipeline down. There is no reconnect-on-drop: the
/// contract is fail once, stop.
pub fn spawn(ctx: Arc<PipelineContext>, config: ReaderConfig) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run(&ctx, &config) {
            error!("stream reader terminated: {e}");
        }
        ctx.shutdown();
    })
}

fn run(ctx: &PipelineContext, config: &ReaderConfig) -> Result<()> {
    // Socket-level read timeout: each receive is bounded individually,
    // while the body as a whole is endless and carries no overall timeout.
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(config.connect_timeout)
        .timeout_read(config.read_timeout)
        .build();

    let response = match agent.get(&config.url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(StreamError::Status(code)),
        Err(e) => return Err(StreamError::Connect(Box::new(e))),
    };
    info!("connected to camera stream at {}", config.url);

    let mut body = response.into_reader();
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];

    while ctx.is_running() {
        let n = match body.read(&mut chunk) {
            Ok(0) => {
                info!("camera stream ended");
                break;
            }
            Ok(n) => n,
            Err(e) => return Err(StreamError::Read(e)),
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some((span, consumed)) = extract_latest_frame(&buf) {
            match Frame::from_jpeg(span) {
                Ok(frame) => ctx.slot.publish(frame),
                // Marker-valid but undecodable span: drop it and move on.
                // The consumed offset still advances so it is never retried.
                Err(e) => warn!("discarding undecodable frame span: {e}"),
            }
            buf.drain(..consumed);
            debug!("buffer truncated to {} unconsumed bytes", buf.len());
        }
    }

    Ok(())
}

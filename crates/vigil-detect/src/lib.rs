// vigil-detect/src/lib.rs
// ============================================================
// vigil-detect – object-detection stage for Vigil
// Runs a YOLOv8-layout ONNX network via ONNX Runtime on frames
// handed over by the capture loop.
// ------------------------------------------------------------
// Pipeline: RgbImage → preprocess → NCHW tensor → Vec<Detection>
// ------------------------------------------------------------
// Public API
//   * OrtYolo::new(path, conf)   – load the model
//   * Detector::detect(&image)   – returns Vec<Detection>
//     where Detection { class, confidence, bbox }
// ============================================================

//! Vigil – detection layer
//!
//! This crate provides a backend-agnostic [`Detector`] trait plus a
//! concrete [`OrtYolo`] implementation. The trait is the seam the capture
//! loop is tested through: any stage that maps an image to a list of
//! labelled boxes can stand in for the real network.
//!
//! Camera frames are noisy, heavily compressed and small, so detection
//! runs on a denoised, sharpened, 1.5× upscaled copy of the frame and the
//! default confidence threshold is deliberately permissive. Reported
//! bounding boxes are pixel integers in the preprocessed image space.

use image::RgbImage;
use log::debug;
use ndarray::{Array4, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod names;
pub mod preprocess;

pub use names::COCO_NAMES;
pub use preprocess::Preprocessor;

/// Network input edge. Ultralytics ONNX exports take square frames.
const INPUT_SIZE: u32 = 640;
/// Permissive by default: the upscaled ESP32 feed is noisy and real
/// objects often score very low.
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.01;
const IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("model load or inference error: {0}")]
    Ort(#[from] ort::Error),
    #[error("unexpected model output shape {0:?}")]
    BadOutputShape(Vec<usize>),
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// A single detection: class label, confidence in `0.0..=1.0`, and a
/// `[x1, y1, x2, y2]` pixel box in the preprocessed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: [i32; 4],
}

/// Trait for object detectors. `detect` never panics on odd inputs; any
/// failure surfaces as a [`DetectError`] the caller downgrades to zero
/// detections.
pub trait Detector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;
}

// ------------------------------------------------------------
// helpers: IoU • NMS
// ------------------------------------------------------------

/// Pre-NMS candidate in f32 model coordinates.
#[derive(Debug, Clone)]
struct Candidate {
    bbox: [f32; 4],
    score: f32,
    class: usize,
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter + 1e-6)
}

fn non_max_suppression(mut dets: Vec<Candidate>, iou_thr: f32) -> Vec<Candidate> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::with_capacity(dets.len());
    'outer: for d in dets {
        for k in &keep {
            if k.class == d.class && iou(&d.bbox, &k.bbox) > iou_thr {
                continue 'outer;
            }
        }
        keep.push(d);
        if keep.len() >= MAX_DETECTIONS {
            break;
        }
    }
    keep
}

/// ONNX Runtime YOLO detector.
pub struct OrtYolo {
    session: Session,
    preprocessor: Preprocessor,
    conf_threshold: f32,
}

impl OrtYolo {
    /// Load and optimize the ONNX model, preparing it for inference.
    ///
    /// Expects the ultralytics export layout: input `images` of
    /// `[1,3,640,640]`, output `output0` of `[1, 4+nc, anchors]`.
    pub fn new(model_path: &str, conf_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;

        Ok(Self {
            session,
            preprocessor: Preprocessor::default(),
            conf_threshold,
        })
    }

    fn class_name(id: usize) -> String {
        COCO_NAMES
            .get(id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("class_{id}"))
    }
}

impl Detector for OrtYolo {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let prepared = self.preprocessor.run(image);
        let (pw, ph) = prepared.dimensions();

        let resized = image::imageops::resize(
            &prepared,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );
        let input = Array4::from_shape_fn(
            (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
            |(_, c, y, x)| resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0,
        );

        let outputs = self
            .session
            .run(ort::inputs!["images" => input.view()]?)?;
        let output = outputs["output0"].try_extract_tensor::<f32>()?;

        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(DetectError::BadOutputShape(shape));
        }
        let classes = shape[1] - 4;
        let pred = output.index_axis(Axis(0), 0); // [4+nc, anchors]

        // Scale factors from model space back to the preprocessed image.
        let sx = pw as f32 / INPUT_SIZE as f32;
        let sy = ph as f32 / INPUT_SIZE as f32;

        let mut candidates = Vec::new();
        for anchor in 0..shape[2] {
            let mut best = 0usize;
            let mut score = 0.0f32;
            for c in 0..classes {
                let s = pred[[4 + c, anchor]];
                if s > score {
                    best = c;
                    score = s;
                }
            }
            if score < self.conf_threshold {
                continue;
            }

            let cx = pred[[0, anchor]];
            let cy = pred[[1, anchor]];
            let w = pred[[2, anchor]];
            let h = pred[[3, anchor]];
            candidates.push(Candidate {
                bbox: [
                    (cx - w / 2.0) * sx,
                    (cy - h / 2.0) * sy,
                    (cx + w / 2.0) * sx,
                    (cy + h / 2.0) * sy,
                ],
                score,
                class: best,
            });
        }

        let kept = non_max_suppression(candidates, IOU_THRESHOLD);
        debug!("{} detections above {:.3}", kept.len(), self.conf_threshold);

        Ok(kept
            .into_iter()
            .map(|c| Detection {
                class: Self::class_name(c.class),
                confidence: c.score,
                bbox: [
                    (c.bbox[0].max(0.0) as i32).min(pw as i32),
                    (c.bbox[1].max(0.0) as i32).min(ph as i32),
                    (c.bbox[2].max(0.0) as i32).min(pw as i32),
                    (c.bbox[3].max(0.0) as i32).min(ph as i32),
                ],
            })
            .collect())
    }
}

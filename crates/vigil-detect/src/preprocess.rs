//! Frame cleanup before inference: denoise, sharpen, upscale.
//!
//! The camera emits small, heavily compressed frames. Blurring away the
//! compression noise, re-sharpening edges, and upscaling gives the network
//! a fighting chance on small objects. Pure image transforms, no state.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Edge-enhancing 3×3 kernel applied after the denoise pass.
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Upscale factor applied last. Detections are reported in this space.
    pub scale: f32,
    /// Gaussian sigma for the denoise pass.
    pub blur_sigma: f32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            scale: 1.5,
            blur_sigma: 1.0,
        }
    }
}

impl Preprocessor {
    pub fn new(scale: f32, blur_sigma: f32) -> Self {
        Self { scale, blur_sigma }
    }

    /// Denoise → sharpen → upscale.
    pub fn run(&self, image: &RgbImage) -> RgbImage {
        let denoised = imageops::blur(image, self.blur_sigma);
        let sharpened: RgbImage = imageproc::filter::filter3x3(&denoised, &SHARPEN_KERNEL);

        let dst_w = (sharpened.width() as f32 * self.scale).round() as u32;
        let dst_h = (sharpened.height() as f32 * self.scale).round() as u32;
        imageops::resize(&sharpened, dst_w, dst_h, FilterType::CatmullRom)
    }
}

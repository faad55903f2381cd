//! Puzzle imaging
//!
//! Decodes the reference image and composites the background/piece surfaces.
//! Pure Rust, so the same code runs in the browser and in tests.

pub mod compose;

pub use compose::{PuzzleSurfaces, compose};

use image::RgbaImage;

use crate::error::{CaptchaError, Result};

/// Decode fetched image bytes into RGBA
pub fn decode(bytes: &[u8], src: &str) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|e| CaptchaError::AssetLoad {
        src: src.to_string(),
        reason: e.to_string(),
    })?;
    let rgba = image.to_rgba8();
    log::info!("Image loaded successfully, size: {}x{}", rgba.width(), rgba.height());
    Ok(rgba)
}

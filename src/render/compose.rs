//! Puzzle compositing
//!
//! Produces the two surfaces the widget shows: the scaled background with the
//! notch overpainted, and the detached piece. The piece is always copied from
//! the source before the notch is painted.

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use crate::captcha::Challenge;
use crate::config::CaptchaConfig;
use crate::error::{CaptchaError, Result};

/// Notch fill: white at 80% opacity
const HOLE_FILL: Rgba<u8> = Rgba([255, 255, 255, 204]);
/// Notch outline
const HOLE_STROKE: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Piece border, contrasting against the image
const PIECE_STROKE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Stroke width for both outlines
const STROKE_WIDTH: u32 = 2;

const FILTER: FilterType = FilterType::Triangle;

/// Rendered puzzle surfaces
#[derive(Debug, Clone)]
pub struct PuzzleSurfaces {
    /// container_width x container_height, notch painted in
    pub background: RgbaImage,
    /// piece_size x piece_size
    pub piece: RgbaImage,
}

/// Build background and piece for a challenge
pub fn compose(
    source: &RgbaImage,
    config: &CaptchaConfig,
    challenge: &Challenge,
) -> Result<PuzzleSurfaces> {
    let (iw, ih) = source.dimensions();
    if iw == 0 || ih == 0 {
        return Err(CaptchaError::Render(format!("source image is {}x{}", iw, ih)));
    }
    let (cw, ch) = (config.container_width, config.container_height);
    let (x, y, size, _) = challenge.notch_rect();
    if size == 0 || x + size > cw || y + size > ch {
        return Err(CaptchaError::Render(format!(
            "notch {}x{} at ({}, {}) outside {}x{} container",
            size, size, x, y, cw, ch
        )));
    }

    let mut background = scaled(source, cw, ch);

    // Copy first: painting the notch destroys the pixels the piece needs
    let mut piece = extract_piece(source, (cw, ch), challenge);

    fill_rect(&mut background, x, y, size, size, HOLE_FILL);
    stroke_rect(&mut background, x, y, size, size, HOLE_STROKE);
    stroke_rect(&mut piece, 0, 0, size, size, PIECE_STROKE);

    log::debug!(
        "Composed {}x{} puzzle from {}x{} source, notch at ({}, {})",
        cw,
        ch,
        iw,
        ih,
        x,
        y
    );

    Ok(PuzzleSurfaces { background, piece })
}

/// The scaled image alone, for when the piece cannot be built
pub fn plain_background(source: &RgbaImage, config: &CaptchaConfig) -> Option<RgbaImage> {
    if source.width() == 0 || source.height() == 0 {
        return None;
    }
    Some(scaled(source, config.container_width, config.container_height))
}

fn scaled(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FILTER)
    }
}

/// Map the notch square from container space into source space and copy it
fn extract_piece(source: &RgbaImage, container: (u32, u32), challenge: &Challenge) -> RgbaImage {
    let (iw, ih) = source.dimensions();
    let sx_scale = iw as f64 / container.0 as f64;
    let sy_scale = ih as f64 / container.1 as f64;

    let sx = ((challenge.target_x as f64 * sx_scale).floor() as u32).min(iw - 1);
    let sy = ((challenge.target_y as f64 * sy_scale).floor() as u32).min(ih - 1);
    let sw = ((challenge.piece_size as f64 * sx_scale).round() as u32).clamp(1, iw - sx);
    let sh = ((challenge.piece_size as f64 * sy_scale).round() as u32).clamp(1, ih - sy);

    let region = imageops::crop_imm(source, sx, sy, sw, sh).to_image();
    scaled(&region, challenge.piece_size, challenge.piece_size)
}

fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (iw, ih) = image.dimensions();
    for py in y..(y + h).min(ih) {
        for px in x..(x + w).min(iw) {
            image.get_pixel_mut(px, py).blend(&color);
        }
    }
}

/// Outline centered on the rectangle edge, like a 2D canvas `strokeRect`.
/// Half the stroke falls outside the rect and is clipped at image bounds.
fn stroke_rect(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (iw, ih) = (image.width() as i64, image.height() as i64);
    let half = (STROKE_WIDTH / 2) as i64;
    let (x0, y0) = (x as i64, y as i64);
    let (x1, y1) = (x0 + w as i64, y0 + h as i64);

    let near = |p: i64, edge: i64| p >= edge - half && p < edge + half;

    for py in (y0 - half).max(0)..(y1 + half).min(ih) {
        for px in (x0 - half).max(0)..(x1 + half).min(iw) {
            if near(px, x0) || near(px, x1) || near(py, y0) || near(py, y1) {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

//! Slide Captcha - a slider-puzzle challenge for login pages
//!
//! Core modules:
//! - `captcha`: Challenge state machine (generation, drag, evaluation)
//! - `render`: Image decoding and background/piece compositing
//! - `config`: Widget configuration with documented defaults
//! - `web`: Browser host (wasm32 only)

pub mod captcha;
pub mod config;
pub mod error;
pub mod render;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use captcha::{CaptchaEvent, CaptchaInput, CaptchaState, Challenge, step};
pub use config::CaptchaConfig;
pub use error::{CaptchaError, Result};

/// Default widget constants
pub mod consts {
    /// Reference image served next to the page
    pub const DEFAULT_IMAGE_SOURCE: &str = "/static/images/house-and-flower.jpg";

    /// Background canvas dimensions
    pub const CONTAINER_WIDTH: u32 = 300;
    pub const CONTAINER_HEIGHT: u32 = 150;

    /// Square piece edge length
    pub const PIECE_SIZE: u32 = 50;
    /// Fixed notch row
    pub const TARGET_Y: u32 = 50;
    /// Targets are drawn from [TARGET_MIN_X, TARGET_MIN_X + TARGET_SPAN)
    pub const TARGET_MIN_X: u32 = 50;
    pub const TARGET_SPAN: u32 = 200;

    /// Max deviation (px, exclusive) that still counts as a match
    pub const TOLERANCE_X: f32 = 5.0;
    /// Red border duration after a miss
    pub const FAILURE_FEEDBACK_MS: u32 = 1000;

    pub const VERIFY_PATH: &str = "/verify-captcha";
    pub const SUCCESS_REDIRECT: &str = "/login";
    pub const TITLE: &str = "Complete the Captcha";
}

//! Widget configuration
//!
//! Every geometry and timing constant the widget uses lives here so hosts and
//! tests can inject boundary values. Loaded from JSON with per-field defaults.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{CaptchaError, Result};

/// Captcha widget configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// URL of the reference image (same-origin or CORS-enabled)
    pub image_source: String,

    // === Geometry (CSS pixels) ===
    /// Width of the background canvas
    pub container_width: u32,
    /// Height of the background canvas
    pub container_height: u32,
    /// Edge length of the square piece
    pub piece_size: u32,
    /// Fixed vertical offset of the notch and piece
    pub target_y: u32,
    /// Smallest target offset that can be generated
    pub target_min_x: u32,
    /// Number of distinct target offsets, starting at `target_min_x`
    pub target_span: u32,

    // === Matching ===
    /// Release counts as a match when |left - target| is below this
    pub tolerance_x: f32,
    /// How long the failure border stays up after a miss
    pub failure_feedback_ms: u32,

    // === Backend ===
    /// Path of the verification endpoint (POST, no body)
    pub verify_path: String,
    /// Where to navigate after the backend approves
    pub success_redirect: String,

    // === DOM ===
    /// Heading shown above the puzzle
    pub title: String,
    /// CSS selector of the mount container (`None` = document body)
    pub mount_selector: Option<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            image_source: DEFAULT_IMAGE_SOURCE.to_string(),

            container_width: CONTAINER_WIDTH,
            container_height: CONTAINER_HEIGHT,
            piece_size: PIECE_SIZE,
            target_y: TARGET_Y,
            target_min_x: TARGET_MIN_X,
            target_span: TARGET_SPAN,

            tolerance_x: TOLERANCE_X,
            failure_feedback_ms: FAILURE_FEEDBACK_MS,

            verify_path: VERIFY_PATH.to_string(),
            success_redirect: SUCCESS_REDIRECT.to_string(),

            title: TITLE.to_string(),
            mount_selector: None,
        }
    }
}

impl CaptchaConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CaptchaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rightmost position the piece may travel to
    pub fn travel_max(&self) -> u32 {
        self.container_width.saturating_sub(self.piece_size)
    }

    /// Largest target offset that can be generated, `None` if the range
    /// does not fit in `u32`
    pub fn target_max_x(&self) -> Option<u32> {
        self.target_min_x
            .checked_add(self.target_span)
            .map(|end| end.saturating_sub(1))
    }

    /// Check that the geometry makes every target reachable and the notch
    /// stays off both container edges
    pub fn validate(&self) -> Result<()> {
        if self.container_width == 0 || self.container_height == 0 {
            return Err(CaptchaError::Config("container must be non-empty".into()));
        }
        if self.piece_size == 0 || self.piece_size >= self.container_width {
            return Err(CaptchaError::Config(format!(
                "piece_size {} must be in 1..{}",
                self.piece_size, self.container_width
            )));
        }
        let fits = self
            .target_y
            .checked_add(self.piece_size)
            .is_some_and(|bottom| bottom <= self.container_height);
        if !fits {
            return Err(CaptchaError::Config(format!(
                "piece at y={} does not fit a container of height {}",
                self.target_y, self.container_height
            )));
        }
        if self.target_span == 0 {
            return Err(CaptchaError::Config("target_span must be at least 1".into()));
        }
        let target_max_x = self.target_max_x().ok_or_else(|| {
            CaptchaError::Config(format!(
                "target_min_x {} + target_span {} overflows",
                self.target_min_x, self.target_span
            ))
        })?;
        if self.target_min_x == 0 || target_max_x >= self.travel_max() {
            return Err(CaptchaError::Config(format!(
                "target range [{}, {}] must lie strictly inside (0, {})",
                self.target_min_x,
                target_max_x,
                self.travel_max()
            )));
        }
        if !self.tolerance_x.is_finite() || self.tolerance_x <= 0.0 {
            return Err(CaptchaError::Config(format!(
                "tolerance_x must be positive, got {}",
                self.tolerance_x
            )));
        }
        if self.verify_path.is_empty() {
            return Err(CaptchaError::Config("verify_path must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_widget() {
        let config = CaptchaConfig::default();
        assert_eq!(config.travel_max(), 250);
        assert_eq!(config.target_min_x, 50);
        assert_eq!(config.target_max_x(), Some(249));
        assert_eq!(config.tolerance_x, 5.0);
        assert_eq!(config.failure_feedback_ms, 1000);
        assert_eq!(config.verify_path, "/verify-captcha");
        assert_eq!(config.success_redirect, "/login");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CaptchaConfig::from_json(r#"{"tolerance_x": 3.5, "title": "Slide it"}"#)
            .expect("valid config");
        assert_eq!(config.tolerance_x, 3.5);
        assert_eq!(config.title, "Slide it");
        assert_eq!(config.container_width, 300);
        assert_eq!(config.mount_selector, None);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = CaptchaConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, CaptchaError::Config(_)));
    }

    #[test]
    fn test_rejects_unreachable_target_range() {
        // 60 + 200 - 1 = 259 > travel_max 250
        let config = CaptchaConfig {
            target_min_x: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Target touching the left edge
        let config = CaptchaConfig {
            target_min_x: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_piece_and_tolerance() {
        let too_tall = CaptchaConfig {
            target_y: 120,
            ..Default::default()
        };
        assert!(too_tall.validate().is_err());

        let zero_tol = CaptchaConfig {
            tolerance_x: 0.0,
            ..Default::default()
        };
        assert!(zero_tol.validate().is_err());

        let nan_tol = CaptchaConfig {
            tolerance_x: f32::NAN,
            ..Default::default()
        };
        assert!(nan_tol.validate().is_err());
    }

    #[test]
    fn test_overflowing_geometry_is_config_error() {
        let err = CaptchaConfig::from_json(r#"{"target_min_x": 4294967295, "target_span": 2}"#)
            .unwrap_err();
        assert!(matches!(err, CaptchaError::Config(_)));

        let err = CaptchaConfig::from_json(r#"{"target_y": 4294967290}"#).unwrap_err();
        assert!(matches!(err, CaptchaError::Config(_)));

        let config = CaptchaConfig {
            target_min_x: u32::MAX,
            target_span: 2,
            ..Default::default()
        };
        assert_eq!(config.target_max_x(), None);
    }

    #[test]
    fn test_boundary_geometry_accepted() {
        // Smallest legal layout: one target at x=1, travel_max=2
        let config = CaptchaConfig {
            container_width: 4,
            container_height: 2,
            piece_size: 2,
            target_y: 0,
            target_min_x: 1,
            target_span: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.target_max_x(), Some(1));
    }
}

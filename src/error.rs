//! Error taxonomy for the captcha widget
//!
//! Only `Config` and `Dom` ever leave the widget (from `mount`). Everything
//! else is logged and contained inside the state machine.

/// Captcha widget errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptchaError {
    /// Reference image could not be fetched or decoded
    #[error("failed to load image {src}: {reason}")]
    AssetLoad { src: String, reason: String },
    /// Piece extraction or hole compositing failed
    #[error("failed to render puzzle: {0}")]
    Render(String),
    /// Backend answered the verification with a non-success status
    #[error("captcha verification rejected (HTTP {status})")]
    VerificationRejected { status: u16 },
    /// Verification request never got an answer
    #[error("error during captcha verification: {0}")]
    VerificationTransport(String),
    /// Invalid widget configuration
    #[error("invalid captcha config: {0}")]
    Config(String),
    /// Missing window/document/element or a failed DOM call
    #[error("dom error: {0}")]
    Dom(String),
}

pub type Result<T, E = CaptchaError> = std::result::Result<T, E>;

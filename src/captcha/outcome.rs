//! Release evaluation and verification outcomes

use serde::{Deserialize, Serialize};

use crate::error::CaptchaError;

/// Result of comparing the released piece against the notch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Match,
    Mismatch,
}

/// Container border styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Feedback {
    #[default]
    Neutral,
    /// Green border, set as soon as the piece lands
    Success,
    /// Red border, cleared by a timer
    Failure,
}

impl Feedback {
    /// CSS border for the container
    pub fn border(&self) -> &'static str {
        match self {
            Feedback::Neutral => "1px solid #ccc",
            Feedback::Success => "2px solid #4CAF50",
            Feedback::Failure => "2px solid #ff0000",
        }
    }
}

/// What the backend said about a verification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    /// 2xx response
    Approved,
    /// Any other HTTP status
    Rejected { status: u16 },
    /// Request failed before a response arrived
    TransportFailed { reason: String },
}

impl VerificationOutcome {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            VerificationOutcome::Approved
        } else {
            VerificationOutcome::Rejected { status }
        }
    }

    /// The error to log for a failed verification
    pub fn error(&self) -> Option<CaptchaError> {
        match self {
            VerificationOutcome::Approved => None,
            VerificationOutcome::Rejected { status } => {
                Some(CaptchaError::VerificationRejected { status: *status })
            }
            VerificationOutcome::TransportFailed { reason } => {
                Some(CaptchaError::VerificationTransport(reason.clone()))
            }
        }
    }
}

/// Tolerance-band match test
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutcomeEvaluator {
    tolerance: f32,
}

impl OutcomeEvaluator {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Strictly-less-than: a deviation equal to the tolerance is a miss
    pub fn evaluate(&self, final_left: f32, target_x: u32) -> Verdict {
        if (final_left - target_x as f32).abs() < self.tolerance {
            Verdict::Match
        } else {
            Verdict::Mismatch
        }
    }
}

//! Challenge state machine
//!
//! All puzzle logic lives here. No DOM, no network, no clocks:
//! - Challenge generation with an injected RNG
//! - Drag tracking clamped to the travel range
//! - Tolerance evaluation and verification bookkeeping
//!
//! Hosts drive it through `step` and execute the queued `CaptchaEvent`s.

pub mod challenge;
pub mod drag;
pub mod outcome;
pub mod state;
pub mod step;

pub use challenge::Challenge;
pub use drag::{DragController, DragState};
pub use outcome::{Feedback, OutcomeEvaluator, Verdict, VerificationOutcome};
pub use state::{CaptchaEvent, CaptchaInput, CaptchaState, Lifecycle, Phase};
pub use step::step;

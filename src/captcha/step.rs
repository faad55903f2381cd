//! Widget transition function
//!
//! Applies one input synchronously. Inputs are processed in arrival order and
//! each one finishes before the next starts, so no batching or interleaving.

use super::outcome::{Feedback, Verdict, VerificationOutcome};
use super::state::{CaptchaEvent, CaptchaInput, CaptchaState, Lifecycle};

/// Advance the widget by one input
pub fn step(state: &mut CaptchaState, input: CaptchaInput) {
    if state.lifecycle == Lifecycle::Destroyed {
        log::debug!("Ignoring {:?} after destroy", input);
        return;
    }

    match input {
        CaptchaInput::AssetReady => {
            if state.lifecycle == Lifecycle::Loading {
                state.lifecycle = Lifecycle::Ready;
                log::info!("Captcha ready (target x={})", state.challenge.target_x);
            }
        }
        CaptchaInput::AssetFailed { error } => {
            log::error!("{}", error);
            state.drag.reset();
            state.lifecycle = Lifecycle::Broken;
            state.failure = Some(error);
        }
        CaptchaInput::PointerDown { pos } => {
            if state.lifecycle != Lifecycle::Ready {
                return;
            }
            state.drag.press(pos.x);
        }
        CaptchaInput::PointerMove { pos } => {
            if let Some(left) = state.drag.move_to(pos.x) {
                state.events.push(CaptchaEvent::MovePiece { left });
            }
        }
        CaptchaInput::PointerUp => {
            if let Some(final_left) = state.drag.release() {
                evaluate_release(state, final_left);
            }
        }
        CaptchaInput::PointerCancel => {
            if state.drag.cancel() {
                state.events.push(CaptchaEvent::MovePiece { left: 0.0 });
            }
        }
        CaptchaInput::FeedbackTimerFired { token } => {
            if state.feedback == Feedback::Failure && token == state.feedback_token {
                state.set_feedback(Feedback::Neutral);
            }
        }
        CaptchaInput::VerificationFinished { ticket, outcome } => {
            finish_verification(state, ticket, outcome);
        }
        CaptchaInput::Destroy => {
            if !state.pending.is_empty() {
                log::info!(
                    "Abandoning {} in-flight verification request(s)",
                    state.pending.len()
                );
            }
            state.drag.reset();
            state.pending.clear();
            state.events.clear();
            state.lifecycle = Lifecycle::Destroyed;
        }
    }
}

/// Hand a finished gesture to the tolerance check
fn evaluate_release(state: &mut CaptchaState, final_left: f32) {
    match state.evaluator.evaluate(final_left, state.challenge.target_x) {
        Verdict::Match => {
            state.set_feedback(Feedback::Success);
            let ticket = state.issue_ticket();
            log::info!("Piece placed at {:.1}, verifying (ticket {})", final_left, ticket);
            state.events.push(CaptchaEvent::Verify { ticket });
        }
        Verdict::Mismatch => {
            log::debug!(
                "Miss: left={:.1} target={}",
                final_left,
                state.challenge.target_x
            );
            state.drag.reset();
            state.events.push(CaptchaEvent::MovePiece { left: 0.0 });
            let token = state.set_feedback(Feedback::Failure);
            state.events.push(CaptchaEvent::ScheduleFeedbackReset {
                token,
                after_ms: state.config.failure_feedback_ms,
            });
        }
    }
}

/// Route a verification result; unknown tickets are dropped
fn finish_verification(state: &mut CaptchaState, ticket: u64, outcome: VerificationOutcome) {
    let Some(idx) = state.pending.iter().position(|&t| t == ticket) else {
        log::warn!("Dropping result for unknown verification ticket {}", ticket);
        return;
    };
    state.pending.remove(idx);

    match outcome.error() {
        None => {
            state.verified = true;
            log::info!("Captcha verified, redirecting to {}", state.config.success_redirect);
            state.events.push(CaptchaEvent::Navigate {
                to: state.config.success_redirect.clone(),
            });
        }
        // Success border stays up: no rollback on a backend rejection
        Some(err) => log::error!("{}", err),
    }
}

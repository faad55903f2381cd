//! Widget state and the inputs/events that drive it
//!
//! One `CaptchaState` per mounted widget. Hosts feed `CaptchaInput`s through
//! `step` and execute the `CaptchaEvent`s it queues.

use glam::Vec2;
use rand::Rng;

use super::challenge::Challenge;
use super::drag::DragController;
use super::outcome::{Feedback, OutcomeEvaluator, VerificationOutcome};
use crate::config::CaptchaConfig;
use crate::error::{CaptchaError, Result};

/// Widget lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for the reference image
    Loading,
    /// Puzzle rendered, accepting drags
    Ready,
    /// Image or render failure; visible but inert
    Broken,
    /// Torn down, all inputs ignored
    Destroyed,
}

/// Interaction phase seen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dragging,
    /// Idle with at least one verification request in flight
    Verifying,
}

/// Everything that can happen to the widget
#[derive(Debug, Clone, PartialEq)]
pub enum CaptchaInput {
    /// Image decoded and both surfaces painted
    AssetReady,
    /// Image fetch/decode or compositing failed
    AssetFailed { error: CaptchaError },
    /// Pointer pressed on the piece (container coordinates)
    PointerDown { pos: Vec2 },
    /// Pointer moved anywhere on the page
    PointerMove { pos: Vec2 },
    /// Pointer released anywhere on the page
    PointerUp,
    /// Browser took the pointer away mid-gesture
    PointerCancel,
    /// Failure-feedback timer elapsed
    FeedbackTimerFired { token: u64 },
    /// Verification request completed
    VerificationFinished {
        ticket: u64,
        outcome: VerificationOutcome,
    },
    /// Widget teardown
    Destroy,
}

/// Side effects requested from the host, in order
#[derive(Debug, Clone, PartialEq)]
pub enum CaptchaEvent {
    /// Reposition the piece surface
    MovePiece { left: f32 },
    /// Restyle the container border
    SetFeedback(Feedback),
    /// Fire `FeedbackTimerFired { token }` after the delay
    ScheduleFeedbackReset { token: u64, after_ms: u32 },
    /// POST to the verify endpoint, answer with `VerificationFinished { ticket }`
    Verify { ticket: u64 },
    /// Leave the page
    Navigate { to: String },
}

/// Complete widget state (single owner, single thread)
#[derive(Debug, Clone)]
pub struct CaptchaState {
    pub config: CaptchaConfig,
    pub challenge: Challenge,
    pub lifecycle: Lifecycle,
    pub drag: DragController,
    pub evaluator: OutcomeEvaluator,
    pub feedback: Feedback,
    /// Bumped on every feedback change; stale timers compare against it
    pub feedback_token: u64,
    /// Tickets of verification requests still in flight
    pub pending: Vec<u64>,
    /// Set once the backend approved
    pub verified: bool,
    /// Why the widget is broken, if it is
    pub failure: Option<CaptchaError>,
    /// Queued side effects
    pub events: Vec<CaptchaEvent>,
    next_ticket: u64,
}

impl CaptchaState {
    /// Validate the config and generate a fresh challenge
    pub fn new<R: Rng>(config: CaptchaConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let challenge = Challenge::generate(&config, rng);
        Ok(Self::with_challenge(config, challenge))
    }

    /// Build around a known challenge
    pub fn with_challenge(config: CaptchaConfig, challenge: Challenge) -> Self {
        Self {
            drag: DragController::new(config.travel_max() as f32),
            evaluator: OutcomeEvaluator::new(config.tolerance_x),
            config,
            challenge,
            lifecycle: Lifecycle::Loading,
            feedback: Feedback::Neutral,
            feedback_token: 0,
            pending: Vec::new(),
            verified: false,
            failure: None,
            events: Vec::new(),
            next_ticket: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.drag.is_dragging() {
            Phase::Dragging
        } else if !self.pending.is_empty() {
            Phase::Verifying
        } else {
            Phase::Idle
        }
    }

    pub fn piece_left(&self) -> f32 {
        self.drag.piece_left()
    }

    /// Take all queued side effects
    pub fn drain_events(&mut self) -> Vec<CaptchaEvent> {
        std::mem::take(&mut self.events)
    }

    /// Change feedback and invalidate any pending revert timer
    pub(crate) fn set_feedback(&mut self, feedback: Feedback) -> u64 {
        self.feedback = feedback;
        self.feedback_token += 1;
        self.events.push(CaptchaEvent::SetFeedback(feedback));
        self.feedback_token
    }

    /// Allocate a ticket for a new verification request
    pub(crate) fn issue_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.push(ticket);
        ticket
    }
}

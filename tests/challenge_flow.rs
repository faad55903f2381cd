//! End-to-end runs of the widget state machine, host side effects included

use glam::Vec2;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use slide_captcha::captcha::{
    CaptchaEvent, CaptchaInput, CaptchaState, Challenge, Feedback, Lifecycle, Phase,
    VerificationOutcome, step,
};
use slide_captcha::{CaptchaConfig, render};

/// Minimal host: records verification requests and pending timers
#[derive(Default)]
struct FakeHost {
    verify_requests: Vec<u64>,
    timers: Vec<(u64, u32)>,
    piece_left: f32,
    border: Feedback,
    navigated_to: Option<String>,
}

impl FakeHost {
    fn run(&mut self, state: &mut CaptchaState, input: CaptchaInput) {
        step(state, input);
        for event in state.drain_events() {
            match event {
                CaptchaEvent::MovePiece { left } => self.piece_left = left,
                CaptchaEvent::SetFeedback(f) => self.border = f,
                CaptchaEvent::ScheduleFeedbackReset { token, after_ms } => {
                    self.timers.push((token, after_ms))
                }
                CaptchaEvent::Verify { ticket } => self.verify_requests.push(ticket),
                CaptchaEvent::Navigate { to } => self.navigated_to = Some(to),
            }
        }
    }

    fn drag(&mut self, state: &mut CaptchaState, grab_x: f32, final_left: f32) {
        let start_left = state.piece_left();
        self.run(state, CaptchaInput::PointerDown { pos: Vec2::new(grab_x, 60.0) });
        // A few intermediate moves, some far outside the container
        for x in [grab_x - 400.0, grab_x + 900.0] {
            self.run(state, CaptchaInput::PointerMove { pos: Vec2::new(x, 60.0) });
        }
        let pointer_x = grab_x + final_left - start_left;
        self.run(state, CaptchaInput::PointerMove { pos: Vec2::new(pointer_x, 60.0) });
        self.run(state, CaptchaInput::PointerUp);
    }

    fn fire_timers(&mut self, state: &mut CaptchaState) {
        for (token, _) in std::mem::take(&mut self.timers) {
            self.run(state, CaptchaInput::FeedbackTimerFired { token });
        }
    }
}

fn scenario_state(target_x: u32) -> CaptchaState {
    let config = CaptchaConfig {
        container_width: 300,
        piece_size: 50,
        tolerance_x: 5.0,
        failure_feedback_ms: 1000,
        ..Default::default()
    };
    let challenge = Challenge {
        target_x,
        target_y: config.target_y,
        piece_size: config.piece_size,
    };
    let mut state = CaptchaState::with_challenge(config, challenge);
    step(&mut state, CaptchaInput::AssetReady);
    state
}

#[test]
fn test_concrete_scenario_miss_then_hit() {
    let mut state = scenario_state(120);
    let mut host = FakeHost::default();
    assert_eq!(state.drag.travel_max(), 250.0);

    // 130 is 10px off: reset, red border, no request
    host.drag(&mut state, 25.0, 130.0);
    assert!(host.verify_requests.is_empty());
    assert_eq!(host.piece_left, 0.0);
    assert_eq!(state.piece_left(), 0.0);
    assert_eq!(host.border, Feedback::Failure);
    assert_eq!(host.timers.len(), 1);
    assert_eq!(host.timers[0].1, 1000);

    host.fire_timers(&mut state);
    assert_eq!(host.border, Feedback::Neutral);
    assert_eq!(state.challenge.target_x, 120);

    // 123 is within 5px: green border, exactly one request
    host.drag(&mut state, 25.0, 123.0);
    assert_eq!(host.border, Feedback::Success);
    assert_eq!(host.verify_requests.len(), 1);
    assert_eq!(state.phase(), Phase::Verifying);

    let ticket = host.verify_requests[0];
    host.run(
        &mut state,
        CaptchaInput::VerificationFinished {
            ticket,
            outcome: VerificationOutcome::Approved,
        },
    );
    assert_eq!(host.navigated_to.as_deref(), Some("/login"));
}

#[test]
fn test_transport_failure_leaves_success_visible() {
    let mut state = scenario_state(200);
    let mut host = FakeHost::default();
    host.drag(&mut state, 10.0, 201.0);
    let ticket = host.verify_requests[0];

    host.run(
        &mut state,
        CaptchaInput::VerificationFinished {
            ticket,
            outcome: VerificationOutcome::TransportFailed {
                reason: "NetworkError when attempting to fetch resource.".into(),
            },
        },
    );
    assert_eq!(host.border, Feedback::Success);
    assert_eq!(host.navigated_to, None);
    assert_eq!(state.phase(), Phase::Idle);
}

#[test]
fn test_broken_asset_keeps_widget_inert() {
    let config = CaptchaConfig::default();
    let mut state = CaptchaState::new(config, &mut Pcg32::seed_from_u64(11)).unwrap();
    let mut host = FakeHost::default();

    let error = render::decode(b"not an image", "/static/images/house-and-flower.jpg")
        .unwrap_err();
    host.run(&mut state, CaptchaInput::AssetFailed { error });
    assert_eq!(state.lifecycle, Lifecycle::Broken);

    let target = state.challenge.target_x as f32;
    host.drag(&mut state, 0.0, target);
    assert!(host.verify_requests.is_empty());
    assert_eq!(state.piece_left(), 0.0);
}

#[test]
fn test_rendered_piece_matches_target_region() {
    let config = CaptchaConfig::default();
    let state = CaptchaState::new(config, &mut Pcg32::seed_from_u64(2024)).unwrap();
    let source = RgbaImage::from_fn(600, 300, |x, y| {
        Rgba([(x / 4) as u8, (y / 2) as u8, 7, 255])
    });

    let surfaces = render::compose(&source, &state.config, &state.challenge).unwrap();
    // 2x downscale of a linear ramp: piece centre reflects the notch position
    let centre = surfaces.piece.get_pixel(25, 25);
    let expected_x = (state.challenge.target_x + 25) / 2;
    assert!((centre[0] as i32 - expected_x as i32).abs() <= 1);
    assert!((centre[1] as i32 - 75).abs() <= 1);
}

proptest! {
    #[test]
    fn prop_only_matches_issue_requests(target in 50u32..250, final_left in 0u32..=250) {
        let final_left = final_left as f32;
        let mut state = scenario_state(target);
        let mut host = FakeHost::default();
        host.drag(&mut state, 40.0, final_left);

        let deviation = (state.piece_left() - target as f32).abs();
        if (final_left - target as f32).abs() < 5.0 {
            prop_assert_eq!(host.verify_requests.len(), 1);
            prop_assert!(deviation < 5.0);
        } else {
            prop_assert!(host.verify_requests.is_empty());
            prop_assert_eq!(state.piece_left(), 0.0);
        }

        // Extra releases never add requests
        let before = host.verify_requests.len();
        host.run(&mut state, CaptchaInput::PointerUp);
        host.run(&mut state, CaptchaInput::PointerUp);
        prop_assert_eq!(host.verify_requests.len(), before);
    }

    #[test]
    fn prop_retry_after_miss_can_still_succeed(target in 50u32..250, miss in 10.0f32..40.0) {
        let mut state = scenario_state(target);
        let mut host = FakeHost::default();
        let miss_left = if target as f32 + miss <= 250.0 {
            target as f32 + miss
        } else {
            target as f32 - miss
        };

        host.drag(&mut state, 5.0, miss_left);
        prop_assert!(host.verify_requests.is_empty());
        prop_assert_eq!(state.piece_left(), 0.0);

        host.drag(&mut state, 5.0, target as f32);
        prop_assert_eq!(host.verify_requests.len(), 1);
        prop_assert_eq!(state.challenge.target_x, target);
    }
}

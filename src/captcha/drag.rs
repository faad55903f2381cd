//! Pointer drag tracking
//!
//! Two states, Idle and Dragging. The piece position is clamped to the travel
//! range on every move, so no input sequence can push it outside.

use serde::{Deserialize, Serialize};

/// Raw drag bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DragState {
    pub is_dragging: bool,
    /// Pointer x minus piece left at press time
    pub start_pointer_x: f32,
    /// Current left offset of the piece, always in [0, travel_max]
    pub current_piece_left: f32,
}

/// Drag state machine for the puzzle piece
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragController {
    state: DragState,
    travel_max: f32,
}

impl DragController {
    pub fn new(travel_max: f32) -> Self {
        Self {
            state: DragState::default(),
            travel_max: travel_max.max(0.0),
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    pub fn piece_left(&self) -> f32 {
        self.state.current_piece_left
    }

    pub fn travel_max(&self) -> f32 {
        self.travel_max
    }

    /// Idle -> Dragging. Keeps the grab offset so the piece does not jump
    /// to the pointer. Returns false if a drag is already running.
    pub fn press(&mut self, pointer_x: f32) -> bool {
        if self.state.is_dragging {
            return false;
        }
        self.state.is_dragging = true;
        self.state.start_pointer_x = pointer_x - self.state.current_piece_left;
        true
    }

    /// Dragging self-loop. Returns the new clamped left, or `None` when idle.
    pub fn move_to(&mut self, pointer_x: f32) -> Option<f32> {
        if !self.state.is_dragging {
            return None;
        }
        let proposed = pointer_x - self.state.start_pointer_x;
        // NaN from a bogus event would otherwise slip through clamp
        let left = if proposed.is_nan() {
            self.state.current_piece_left
        } else {
            proposed.clamp(0.0, self.travel_max)
        };
        self.state.current_piece_left = left;
        Some(left)
    }

    /// Dragging -> Idle. Yields the final left exactly once per gesture.
    pub fn release(&mut self) -> Option<f32> {
        if !self.state.is_dragging {
            return None;
        }
        self.state.is_dragging = false;
        Some(self.state.current_piece_left)
    }

    /// Abort the gesture and send the piece home
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.state.is_dragging;
        self.reset();
        was_dragging
    }

    /// Back to idle at the start position
    pub fn reset(&mut self) {
        self.state = DragState::default();
    }
}

//! Per-frame decision state machine.
//!
//! While the line is out the bobber sits in the middle of the view and its
//! dark outline fills part of the centre region. When a fish bites the bobber
//! is pulled under, the dark pixels vanish, and the engine reels in and casts
//! again.

use crate::analysis::{center_region, color_mask, match_ratio};
use fishctl_capture::Frame;
use std::time::Duration;
use tracing::{debug, info};

/// Side of the square inspected at the centre of the frame
pub const REGION_SIZE: usize = 20;
/// Largest RGB distance from [`BOBBER_COLOR`] that still counts as a match
pub const COLOR_DISTANCE: f32 = 10.0;
/// A match ratio at or below this means the bobber is gone
pub const RATIO_THRESHOLD: f32 = 0.025;
/// RGB colour of the bobber outline
pub const BOBBER_COLOR: [u8; 3] = [0, 0, 0];

/// Last input the engine committed to; a reel is always followed by a cast in the same decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastAction {
    None,
    Cast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationState {
    /// True until the opening settle-and-cast has been issued
    pub starting: bool,
    pub last_action: LastAction,
}

impl Default for AutomationState {
    fn default() -> Self {
        Self {
            starting: true,
            last_action: LastAction::None,
        }
    }
}

/// Input step requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Let the game settle, dismiss any overlay, then cast
    SettleAndCast,
    Reel,
    Cast,
    Wait(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Act(Vec<Action>),
}

pub struct DecisionEngine {
    state: AutomationState,
    recast_delay: Duration,
    catches: u64,
}

impl DecisionEngine {
    pub fn new(recast_delay: Duration) -> Self {
        Self {
            state: AutomationState::default(),
            recast_delay,
            catches: 0,
        }
    }

    pub fn state(&self) -> AutomationState {
        self.state
    }

    /// Bites detected since creation or the last reset
    pub fn catches(&self) -> u64 {
        self.catches
    }

    pub fn reset(&mut self) {
        self.state = AutomationState::default();
        self.catches = 0;
    }

    pub fn decide(&mut self, frame: &Frame) -> Decision {
        if self.state.starting {
            self.state.starting = false;
            self.state.last_action = LastAction::Cast;
            info!("casting for the first time");
            return Decision::Act(vec![Action::SettleAndCast]);
        }

        let ratio = bobber_ratio(frame);
        if ratio > RATIO_THRESHOLD {
            debug!(ratio, "bobber visible");
            return Decision::Continue;
        }

        self.catches += 1;
        self.state.last_action = LastAction::Cast;
        info!(ratio, catches = self.catches, "bite detected, reeling in");
        Decision::Act(vec![
            Action::Reel,
            Action::Wait(self.recast_delay),
            Action::Cast,
        ])
    }
}

/// Share of the centre region that looks like the bobber
pub fn bobber_ratio(frame: &Frame) -> f32 {
    let region = center_region(&frame.pixels, REGION_SIZE);
    let mask = color_mask(region, frame.format, BOBBER_COLOR, COLOR_DISTANCE);
    match_ratio(&mask)
}

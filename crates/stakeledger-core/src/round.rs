//! Round arithmetic.
//!
//! A round is a span of `active_delegates` consecutive heights. The delegate
//! count may change at milestones, so the calculator splits the chain into
//! windows at every height where it changes and counts rounds within each
//! window from that window's start.

use serde::{Deserialize, Serialize};

use crate::config::Milestones;
use crate::error::CoreError;

/// Position of a height within its round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    /// 1-based round number.
    pub round: u64,
    /// First height of the round.
    pub round_height: u64,
    /// First height of the following round.
    pub next_round_height: u64,
    pub active_delegates: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Window {
    start_height: u64,
    first_round: u64,
    active_delegates: u32,
}

/// Maps heights to rounds. Pure over the milestone table it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundCalculator {
    windows: Vec<Window>,
}

impl RoundCalculator {
    /// Build the window table.
    ///
    /// Fails if a delegate-count change does not land on a round boundary
    /// of the preceding window.
    pub fn new(milestones: &Milestones) -> Result<Self, CoreError> {
        let mut windows: Vec<Window> = Vec::new();

        for milestone in milestones.iter() {
            let Some(prev) = windows.last().copied() else {
                windows.push(Window {
                    start_height: 1,
                    first_round: 1,
                    active_delegates: milestone.active_delegates,
                });
                continue;
            };
            if milestone.active_delegates == prev.active_delegates {
                continue;
            }

            let span = milestone.height - prev.start_height;
            let n = u64::from(prev.active_delegates);
            if span % n != 0 {
                return Err(CoreError::MisalignedMilestone {
                    height: milestone.height,
                    span,
                    active_delegates: prev.active_delegates,
                });
            }
            windows.push(Window {
                start_height: milestone.height,
                first_round: prev.first_round + span / n,
                active_delegates: milestone.active_delegates,
            });
        }

        if windows.is_empty() {
            return Err(CoreError::InvalidMilestones("no milestones".into()));
        }
        Ok(Self { windows })
    }

    /// Round information for `height`. Heights below 1 are treated as 1.
    pub fn round(&self, height: u64) -> RoundInfo {
        let height = height.max(1);
        let idx = self.windows.partition_point(|w| w.start_height <= height);
        let window = self.windows[idx.saturating_sub(1)];

        let n = u64::from(window.active_delegates);
        let rounds_in = (height - window.start_height) / n;
        let round_height = window.start_height + rounds_in * n;

        RoundInfo {
            round: window.first_round + rounds_in,
            round_height,
            next_round_height: round_height + n,
            active_delegates: window.active_delegates,
        }
    }

    /// Whether `height` is the first height of a round.
    pub fn is_new_round(&self, height: u64) -> bool {
        height >= 1 && self.round(height).round_height == height
    }
}

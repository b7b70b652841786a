//! engine::circumstance
//!
//! Environment facts an alteration must satisfy.

use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

/// Read-only snapshot of environment facts, supplied fresh per evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circumstance {
    /// Current number of occupied seats (members, users).
    pub occupancy: u32,
    /// Grace period after the restriction cutoff, in seconds.
    pub postpayment_period: Timestamp,
}

impl Circumstance {
    /// Circumstance with the given occupancy and no grace period.
    pub fn new(occupancy: u32) -> Self {
        Self {
            occupancy,
            postpayment_period: 0,
        }
    }

    /// Set the postpayment grace period.
    pub fn with_postpayment_period(mut self, seconds: Timestamp) -> Self {
        self.postpayment_period = seconds;
        self
    }
}

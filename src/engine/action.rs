//! engine::action
//!
//! Execution-time facts under which an alteration is attempted.
//!
//! # Overview
//!
//! An [`ActionContext`] is derived by the plan from its current state and
//! the caller's funding [`Method`]. Business code never builds one directly;
//! the constructor exists for rule-level tests.
//!
//! # Invariants
//!
//! - `is_active()` holds iff the active reasons intersect
//!   [`ActionContext::ACTING_REASONS`]
//! - `has_reason()` holds iff the method is `Payment` or `Promo`

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

/// How an alteration is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Funded by a payment; provides a reason.
    Payment,
    /// Funded by a promo; provides a reason.
    Promo,
    /// No funding attached.
    Detached,
    /// Ignore every rule and commit the proposed state.
    Force,
}

impl Method {
    /// Whether the method funds the alteration.
    pub fn has_reason(self) -> bool {
        matches!(self, Method::Payment | Method::Promo)
    }
}

/// Trial sub-state at the moment of the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    /// No trial, or the trial is used up.
    None,
    /// Trial can be started but is not running.
    Available,
    /// Trial is running.
    Active,
}

/// Why a plan counts as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveReason {
    /// Active-until is infinite.
    Infinite,
    /// Active-until is in the future.
    NotExpired,
    /// Current limit tier is free.
    FreeLimit,
    /// Not active.
    None,
}

/// Derived execution-time facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    method: Method,
    trial_state: TrialState,
    active_reasons: BTreeSet<ActiveReason>,
    time: Timestamp,
}

impl ActionContext {
    /// Reasons that make a plan count as active.
    pub const ACTING_REASONS: [ActiveReason; 3] = [
        ActiveReason::Infinite,
        ActiveReason::NotExpired,
        ActiveReason::FreeLimit,
    ];

    /// Build a context from explicit facts.
    ///
    /// An empty reason list is normalised to `[ActiveReason::None]`.
    pub fn new(
        method: Method,
        trial_state: TrialState,
        active_reasons: impl IntoIterator<Item = ActiveReason>,
        time: Timestamp,
    ) -> Self {
        let mut active_reasons: BTreeSet<ActiveReason> = active_reasons.into_iter().collect();
        if active_reasons.is_empty() {
            active_reasons.insert(ActiveReason::None);
        }

        Self {
            method,
            trial_state,
            active_reasons,
            time,
        }
    }

    /// Funding method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Trial sub-state.
    pub fn trial_state(&self) -> TrialState {
        self.trial_state
    }

    /// Time of the action.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Reasons the plan counts as active.
    pub fn active_reasons(&self) -> impl Iterator<Item = ActiveReason> + '_ {
        self.active_reasons.iter().copied()
    }

    /// Whether any acting reason holds.
    pub fn is_active(&self) -> bool {
        Self::ACTING_REASONS
            .iter()
            .any(|reason| self.active_reasons.contains(reason))
    }

    /// Whether the plan is active for the given reason.
    pub fn is_active_on(&self, reason: ActiveReason) -> bool {
        self.is_active() && self.active_reasons.contains(&reason)
    }

    /// Whether the method funds the alteration.
    pub fn has_reason(&self) -> bool {
        self.method.has_reason()
    }

    /// Whether the method is `Promo`.
    pub fn is_promo(&self) -> bool {
        self.method == Method::Promo
    }

    /// Whether the method is `Force`.
    pub fn is_forced(&self) -> bool {
        self.method == Method::Force
    }

    /// Whether a trial is running.
    pub fn is_trial_active(&self) -> bool {
        self.trial_state == TrialState::Active
    }

    /// Whether a trial can be started.
    pub fn is_trial_available(&self) -> bool {
        self.trial_state == TrialState::Available
    }
}

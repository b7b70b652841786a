//! engine::options::limit
//!
//! Tiered capacity ceiling.
//!
//! # Judgment
//!
//! The limit judge walks an ordered rule list and stops at the first rule
//! that applies. Family switches in [`LimitRules`](crate::engine::family::LimitRules)
//! enable the family-specific rules.
//!
//! ```text
//! same value on a plain change                  -> UnavailableSame
//! value changes without Change                  -> change action required
//! prospective value does not fit occupancy      -> limit exceeded
//! infinite plan while leaving a free tier       -> can not be infinite
//! unused trial, not an activation               -> trial must be started first
//! inactive, not an activation, paid target      -> must activate first
//! reason-funded decrease                        -> can not decrease with reason
//! decrease (or trial change) without Prolong    -> Free
//! free target without Extend/Set prolongation   -> Free
//! trial behaviour applies                       -> WhileTrial
//! otherwise                                     -> ReasonRequired
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::{decode_fields, Facet, FacetData, FacetError, PlanOption, Transition};
use crate::core::availability::{codes, Availability, AvailabilityStatus};
use crate::core::catalog::TierCatalog;
use crate::core::types::{FacetKey, INFINITE};
use crate::engine::action::ActiveReason;
use crate::engine::alteration::TrialBehaviour;
use crate::engine::circumstance::Circumstance;
use crate::engine::family::PlanFamily;

/// Capacity ceiling taken from the family's tier catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Limit {
    value: u32,
}

#[derive(Deserialize)]
struct RawLimit {
    value: u32,
}

impl Limit {
    /// Create a limit, checking the tier against the catalog.
    ///
    /// # Errors
    ///
    /// Returns `FacetError::Catalog` if the value is not a tier.
    pub fn new(value: u32, catalog: &TierCatalog) -> Result<Self, FacetError> {
        let value = catalog.require(value)?;
        Ok(Self { value })
    }

    pub(crate) fn decode(data: &FacetData, catalog: &TierCatalog) -> Result<Self, FacetError> {
        let raw: RawLimit = decode_fields(FacetKey::Limit, data)?;
        Self::new(raw.value, catalog)
    }

    /// Tier value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Whether the tier is flagged free in the family catalog.
    pub fn is_free(&self, family: &PlanFamily) -> bool {
        family
            .catalog()
            .map(|catalog| catalog.is_free(self.value))
            .unwrap_or(false)
    }

    fn unappropriated(code: u32, message: &str) -> AvailabilityStatus {
        AvailabilityStatus::rejection(Availability::UnavailableUnappropriated, code, message)
    }
}

impl Facet for Limit {
    const KEY: FacetKey = FacetKey::Limit;

    fn project(option: &PlanOption) -> Option<&Self> {
        match option {
            PlanOption::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    fn is_fit(&self, circumstance: &Circumstance) -> bool {
        self.value >= circumstance.occupancy
    }

    fn propose_replacement(&self, transition: &Transition<'_>) -> Self {
        if self.is_fit(transition.circumstance) {
            return *self;
        }

        match transition.family.catalog() {
            Some(catalog) => Self {
                value: catalog.smallest_fitting(transition.circumstance.occupancy),
            },
            None => *self,
        }
    }

    fn judge(&self, transition: &Transition<'_>) -> AvailabilityStatus {
        let Some(target) = Self::prospective(transition) else {
            return AvailabilityStatus::detached();
        };

        let family = transition.family;
        let rules = family.limit_rules();
        let action = transition.action;
        let request = transition.request;
        let circumstance = transition.circumstance;

        let is_same = self == target;
        let is_activation = request.is_activation();
        let is_decrease = self.value > target.value;
        let target_fits = target.is_fit(circumstance);

        if is_same && request.is_change() && !is_activation {
            return AvailabilityStatus::rejection(
                Availability::UnavailableSame,
                codes::LIMIT_UNSUPPORTED_REPLACEMENT,
                "limit is the same",
            );
        }

        if !is_same && !request.is_change() {
            return Self::unappropriated(
                codes::LIMIT_CHANGE_WITHOUT_CHANGE_ACTION,
                "change action required",
            );
        }

        let plain_prolongation = request.is_prolongation() && !is_activation;
        if !target_fits && !(rules.exceed_allows_plain_prolongation && plain_prolongation) {
            return Self::unappropriated(codes::LIMIT_EXCEEDED, "limit exceeded");
        }

        if transition.prospective.active_until == INFINITE && self.is_free(family) {
            return Self::unappropriated(
                codes::LIMIT_UNSUPPORTED_REPLACEMENT,
                "limit can not be infinite",
            );
        }

        if rules.block_until_trial_started && action.is_trial_available() && !is_activation {
            return Self::unappropriated(
                codes::LIMIT_UNSUPPORTED_REPLACEMENT,
                "trial must be started first",
            );
        }

        if !action.is_active_on(ActiveReason::Infinite)
            && !action.is_active_on(ActiveReason::NotExpired)
            && !is_activation
            && !target.is_free(family)
        {
            return Self::unappropriated(
                codes::LIMIT_UNSUPPORTED_REPLACEMENT,
                "plan must be activated first",
            );
        }

        if is_decrease && action.has_reason() && !is_activation {
            return Self::unappropriated(
                codes::LIMIT_UNSUPPORTED_REPLACEMENT,
                "limit can not be decreased with a reason",
            );
        }

        if rules.exceed_allows_plain_prolongation && request.is_change() && !target_fits {
            return Self::unappropriated(codes::LIMIT_EXCEEDED, "limit exceeded");
        }

        let free_trial_change = rules.free_changes_during_trial && action.is_trial_active();
        if !request.is_prolongation() && (is_decrease || free_trial_change) {
            return AvailabilityStatus::free();
        }

        if target.is_free(family)
            && !request.is_prolongation_extend()
            && !request.is_prolongation_set()
        {
            return AvailabilityStatus::free();
        }

        let while_trial = (request.has_trial_behaviour(TrialBehaviour::FreeWhileActive)
            && action.is_trial_active())
            || (request.has_trial_behaviour(TrialBehaviour::FreeWhileAvailable)
                && action.is_trial_available());
        if while_trial {
            return AvailabilityStatus::while_trial();
        }

        AvailabilityStatus::reason_required()
    }

    fn export(&self) -> FacetData {
        let mut data = FacetData::new();
        data.insert("value".to_string(), Value::from(self.value));
        data
    }
}

//! engine::options::restrict_policy
//!
//! Access cutoff that follows the plan's active-until date.

use serde::Deserialize;
use serde_json::Value;

use super::{decode_fields, Facet, FacetData, FacetError, PlanOption, Transition};
use crate::core::types::{FacetKey, Timestamp, INFINITE};

/// Moment from which access is restricted; `0` means never.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RestrictPolicy {
    active_from: Timestamp,
}

#[derive(Deserialize)]
struct RawRestrictPolicy {
    active_from: Timestamp,
}

impl RestrictPolicy {
    pub fn new(active_from: Timestamp) -> Self {
        Self { active_from }
    }

    pub(crate) fn decode(data: &FacetData) -> Result<Self, FacetError> {
        let raw: RawRestrictPolicy = decode_fields(FacetKey::RestrictPolicy, data)?;
        Ok(Self::new(raw.active_from))
    }

    pub fn active_from(&self) -> Timestamp {
        self.active_from
    }

    /// Whether access is restricted at `time`, allowing `delta` seconds of grace.
    pub fn is_restricted(&self, time: Timestamp, delta: Timestamp) -> bool {
        self.active_from != 0 && time > self.active_from.saturating_add(delta)
    }
}

impl Facet for RestrictPolicy {
    const KEY: FacetKey = FacetKey::RestrictPolicy;

    fn project(option: &PlanOption) -> Option<&Self> {
        match option {
            PlanOption::RestrictPolicy(policy) => Some(policy),
            _ => None,
        }
    }

    fn propose_replacement(&self, transition: &Transition<'_>) -> Self {
        match transition.prospective.active_until {
            INFINITE => Self::new(0),
            active_until => Self::new(active_until),
        }
    }

    fn export(&self) -> FacetData {
        let mut data = FacetData::new();
        data.insert("active_from".to_string(), Value::from(self.active_from));
        data
    }
}

//! engine::snapshot
//!
//! Immutable plan state and its storage form.
//!
//! # Types
//!
//! - [`PlanSnapshot`] - dates plus one option per facet
//! - [`SnapshotData`] - the flat storage shape a snapshot is exported to and
//!   constructed from
//!
//! # Invariants
//!
//! - `active_until == 0` means the plan never expires
//! - A complete snapshot holds exactly one option per facet of its family;
//!   partial snapshots only exist while alterations are being proposed

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::options::{
    DemoWindow, ExtendPolicy, Facet, FacetData, Limit, PlanOption, RestrictPolicy,
};
use crate::core::types::{FacetKey, Timestamp, INFINITE};

/// `valid_till` written into exported snapshot data.
pub const VALID_TILL_FOREVER: Timestamp = 2_147_483_647;

/// Dates and option values of a plan at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSnapshot {
    pub active_until: Timestamp,
    pub free_active_until: Timestamp,
    options: BTreeMap<FacetKey, PlanOption>,
}

impl PlanSnapshot {
    /// Snapshot with dates and no options.
    pub fn new(active_until: Timestamp, free_active_until: Timestamp) -> Self {
        Self {
            active_until,
            free_active_until,
            options: BTreeMap::new(),
        }
    }

    /// Set the option for its facet, replacing any previous one.
    pub fn with_option(mut self, option: impl Into<PlanOption>) -> Self {
        self.set_option(option.into());
        self
    }

    pub(crate) fn set_option(&mut self, option: PlanOption) {
        self.options.insert(option.key(), option);
    }

    pub(crate) fn with_options(mut self, options: BTreeMap<FacetKey, PlanOption>) -> Self {
        self.options = options;
        self
    }

    pub fn option(&self, key: FacetKey) -> Option<&PlanOption> {
        self.options.get(&key)
    }

    pub fn options(&self) -> impl Iterator<Item = &PlanOption> {
        self.options.values()
    }

    fn typed<T: Facet>(&self) -> Option<&T> {
        self.option(T::KEY).and_then(T::project)
    }

    pub fn limit(&self) -> Option<&Limit> {
        self.typed()
    }

    pub fn extend_policy(&self) -> Option<&ExtendPolicy> {
        self.typed()
    }

    pub fn restrict_policy(&self) -> Option<&RestrictPolicy> {
        self.typed()
    }

    pub fn demo(&self) -> Option<&DemoWindow> {
        self.typed()
    }

    /// Whether the plan never expires.
    pub fn is_infinite(&self) -> bool {
        self.active_until == INFINITE
    }

    /// Whether dates match and every option is the same as `other`'s.
    pub fn is_same(&self, other: &PlanSnapshot) -> bool {
        self.active_until == other.active_until
            && self.free_active_until == other.free_active_until
            && self.options.len() == other.options.len()
            && self.options.iter().all(|(key, option)| {
                other
                    .options
                    .get(key)
                    .is_some_and(|theirs| option.is_same(theirs))
            })
    }

    /// Storage form of the options, keyed by facet name.
    pub fn export_options(&self) -> BTreeMap<String, FacetData> {
        self.options
            .iter()
            .map(|(key, option)| (key.as_str().to_string(), option.export()))
            .collect()
    }
}

/// Flat storage shape of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Family id.
    pub plan_type: u32,
    /// Variant id.
    pub plan_id: u32,
    pub valid_till: Timestamp,
    pub active_till: Timestamp,
    pub free_active_till: Timestamp,
    #[serde(default)]
    pub option_list: BTreeMap<String, FacetData>,
}

impl SnapshotData {
    /// Data for `variant` with no options; missing facets take family defaults.
    pub fn new(plan_type: u32, plan_id: u32, active_till: Timestamp, free_active_till: Timestamp) -> Self {
        Self {
            plan_type,
            plan_id,
            valid_till: VALID_TILL_FOREVER,
            active_till,
            free_active_till,
            option_list: BTreeMap::new(),
        }
    }

    /// Add raw fields for one facet.
    pub fn with_facet(mut self, facet: FacetKey, data: FacetData) -> Self {
        self.option_list.insert(facet.as_str().to_string(), data);
        self
    }
}

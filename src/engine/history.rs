//! engine::history
//!
//! Replay of append-only plan history into a snapshot.
//!
//! # Architecture
//!
//! Storage hands over an ordered record list. Each record carries the dates
//! of the plan at that moment and raw fields for some of its facets. The
//! replay is a set of independent folds over the same records, each with an
//! explicit accumulator:
//!
//! 1. The record with the greatest id selects the plan variant
//! 2. Plan dates come from the record with the greatest id
//! 3. Each facet folds only over records that mention it, advancing only on
//!    an id strictly greater than the greatest id seen for that facet; the
//!    accepted fields are overlaid onto the family defaults
//! 4. The extend policy folds monotonically (`free < trial < never`, with
//!    `never` terminal) and tracks the earliest trial deadline: a record's
//!    explicit `trial_till`, or else the expiry of a `trial` record
//!
//! Because every fold is keyed on ids rather than positions, interleaved or
//! unsorted input yields the same snapshot.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tariffwork::core::catalog::TierCatalog;
//! use tariffwork::core::types::FacetKey;
//! use tariffwork::engine::family::PlanFamily;
//! use tariffwork::engine::history::{replay, HistoryRecord};
//!
//! let catalog = TierCatalog::new(vec![10, 20], vec![10]).unwrap();
//! let family = PlanFamily::new("seats", 2000, vec![FacetKey::Limit], Some(catalog)).unwrap();
//!
//! let records = vec![
//!     HistoryRecord::new(2, 2001, 900, 0).with_facet(FacetKey::Limit, json!({"value": 20})),
//!     HistoryRecord::new(1, 2001, 500, 0).with_facet(FacetKey::Limit, json!({"value": 10})),
//! ];
//!
//! let replayed = replay(&family, &records).unwrap();
//! assert_eq!(replayed.snapshot.active_until, 900);
//! assert_eq!(replayed.snapshot.limit().unwrap().value(), 20);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::family::PlanFamily;
use super::options::{overlay, ExtendRule, FacetData};
use super::plan::PlanError;
use super::snapshot::PlanSnapshot;
use crate::core::types::{FacetKey, PlanVariantId, Timestamp, INFINITE, UNBOUNDED};

/// One stored state of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Monotonic, not necessarily contiguous.
    pub id: u64,
    /// Variant id.
    pub plan_id: u32,
    pub active_till: Timestamp,
    pub free_active_till: Timestamp,
    /// Raw facet fields keyed by facet name.
    #[serde(default)]
    pub option_list: BTreeMap<String, FacetData>,
}

impl HistoryRecord {
    pub fn new(id: u64, plan_id: u32, active_till: Timestamp, free_active_till: Timestamp) -> Self {
        Self {
            id,
            plan_id,
            active_till,
            free_active_till,
            option_list: BTreeMap::new(),
        }
    }

    /// Attach raw fields for a facet. Non-object values are stored as empty.
    pub fn with_facet(mut self, facet: FacetKey, fields: Value) -> Self {
        let data = match fields {
            Value::Object(map) => map,
            _ => FacetData::new(),
        };
        self.option_list.insert(facet.as_str().to_string(), data);
        self
    }

    pub fn variant(&self) -> PlanVariantId {
        PlanVariantId::new(self.plan_id)
    }

    /// Raw fields of a facet, if the record mentions it.
    pub fn facet(&self, facet: FacetKey) -> Option<&FacetData> {
        self.option_list.get(facet.as_str())
    }
}

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    /// Variant named by the latest record.
    pub variant: PlanVariantId,
    pub snapshot: PlanSnapshot,
}

/// Record with the greatest id.
pub fn last_record(records: &[HistoryRecord]) -> Option<&HistoryRecord> {
    records.iter().max_by_key(|record| record.id)
}

/// Fold `records` into a snapshot of `family`.
///
/// # Errors
///
/// - `EmptyHistory` if there are no records
/// - `Facet` if folded facet data cannot be decoded
pub fn replay(family: &PlanFamily, records: &[HistoryRecord]) -> Result<Replayed, PlanError> {
    let last = last_record(records).ok_or(PlanError::EmptyHistory)?;

    let dates = records.iter().fold(DatesFold::default(), DatesFold::apply);

    let mut options = BTreeMap::new();
    for facet in family.facets() {
        let data = match facet {
            FacetKey::ExtendPolicy => fold_extend_policy(family, records),
            other => fold_facet(*other, records),
        };
        options.insert(*facet, family.decode(*facet, Some(&data))?);
    }

    tracing::debug!(
        family = %family.name(),
        variant = last.plan_id,
        records = records.len(),
        last_id = last.id,
        "history replayed"
    );

    Ok(Replayed {
        variant: last.variant(),
        snapshot: PlanSnapshot::new(dates.active_until, dates.free_active_until)
            .with_options(options),
    })
}

/// Fields of one facet after replay, before defaults are applied.
///
/// Records that do not mention the facet are skipped.
pub fn fold_facet(facet: FacetKey, records: &[HistoryRecord]) -> FacetData {
    records
        .iter()
        .fold(FacetFold::default(), |acc, record| acc.apply(facet, record))
        .data
}

/// Fields of the extend policy after replay, before defaults are applied.
pub fn fold_extend_policy(family: &PlanFamily, records: &[HistoryRecord]) -> FacetData {
    records
        .iter()
        .fold(ExtendPolicyFold::new(family.defaults().extend_rule), ExtendPolicyFold::apply)
        .finish()
}

#[derive(Debug, Default)]
struct DatesFold {
    seen: Option<u64>,
    active_until: Timestamp,
    free_active_until: Timestamp,
}

impl DatesFold {
    fn apply(self, record: &HistoryRecord) -> Self {
        if self.seen.is_some_and(|seen| record.id <= seen) {
            return self;
        }
        Self {
            seen: Some(record.id),
            active_until: record.active_till,
            free_active_until: record.free_active_till,
        }
    }
}

#[derive(Debug, Default)]
struct FacetFold {
    seen: Option<u64>,
    data: FacetData,
}

impl FacetFold {
    fn apply(self, facet: FacetKey, record: &HistoryRecord) -> Self {
        let Some(fields) = record.facet(facet) else {
            return self;
        };
        if self.seen.is_some_and(|seen| record.id <= seen) {
            return self;
        }
        Self {
            seen: Some(record.id),
            data: overlay(self.data, Some(fields)),
        }
    }
}

#[derive(Debug)]
struct ExtendPolicyFold {
    rule: ExtendRule,
    data: FacetData,
    trial_until: Timestamp,
    unparsed: Option<String>,
}

impl ExtendPolicyFold {
    fn new(rule: ExtendRule) -> Self {
        Self {
            rule,
            data: FacetData::new(),
            trial_until: UNBOUNDED,
            unparsed: None,
        }
    }

    fn apply(mut self, record: &HistoryRecord) -> Self {
        let Some(fields) = record.facet(FacetKey::ExtendPolicy) else {
            return self;
        };

        let rule = match fields.get("rule").and_then(Value::as_str) {
            Some(raw) => match raw.parse::<ExtendRule>() {
                Ok(rule) => rule,
                Err(_) => {
                    // Left for decoding to report.
                    self.unparsed.get_or_insert_with(|| raw.to_string());
                    return self;
                }
            },
            None => self.rule,
        };

        // An explicit deadline wins over the expiry of a trial record.
        let deadline = match fields.get("trial_till").and_then(Value::as_i64) {
            Some(explicit) => Some(explicit),
            None if rule == ExtendRule::Trial => Some(record.active_till),
            None => None,
        };
        if let Some(deadline) = deadline.filter(|deadline| *deadline != INFINITE) {
            self.trial_until = self.trial_until.min(deadline);
        }

        if self.rule != ExtendRule::Never && rule >= self.rule {
            self.rule = rule;
            self.data = overlay(self.data, Some(fields));
        }

        self
    }

    fn finish(mut self) -> FacetData {
        let rule = match self.unparsed {
            Some(raw) => Value::from(raw),
            None => Value::from(self.rule.as_str()),
        };
        self.data.insert("rule".to_string(), rule);
        if self.trial_until != UNBOUNDED {
            self.data
                .insert("trial_till".to_string(), Value::from(self.trial_until));
        } else {
            self.data.remove("trial_till");
        }
        self.data
    }
}

//! engine::registry
//!
//! Variant id to plan family lookup.
//!
//! Storage only knows variant ids. The registry maps each id to the shared
//! [`PlanFamily`] that gives it meaning, and is the entry point for loading
//! plans from either storage shape. An id nobody registered is a hard
//! failure, never a fallback.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::family::PlanFamily;
use super::history::{last_record, HistoryRecord};
use super::plan::{PlanError, TariffPlan};
use super::snapshot::SnapshotData;
use crate::core::config::CatalogConfig;
use crate::core::types::PlanVariantId;

/// Known plan variants.
#[derive(Debug, Clone, Default)]
pub struct PlanRegistry {
    variants: BTreeMap<PlanVariantId, Arc<PlanFamily>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with every family and variant of a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a family cannot be built from its config.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, PlanError> {
        let mut registry = Self::new();
        for family_config in &config.family {
            let family = Arc::new(PlanFamily::from_config(family_config)?);
            for variant in &family_config.variants {
                registry.register(PlanVariantId::new(*variant), family.clone());
            }
        }
        tracing::debug!(variants = registry.len(), "registry built");
        Ok(registry)
    }

    /// Map `variant` to `family`, replacing any previous mapping.
    pub fn register(&mut self, variant: PlanVariantId, family: Arc<PlanFamily>) -> &mut Self {
        self.variants.insert(variant, family);
        self
    }

    /// Family of a variant.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariant` if the id was never registered.
    pub fn resolve(&self, variant: PlanVariantId) -> Result<Arc<PlanFamily>, PlanError> {
        self.variants
            .get(&variant)
            .cloned()
            .ok_or(PlanError::UnknownVariant(variant))
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Replay a record list into a plan of the variant its latest record names.
    ///
    /// # Errors
    ///
    /// - `EmptyHistory` if there are no records
    /// - `UnknownVariant` if the latest record names an unregistered variant
    /// - `Facet` if folded facet data cannot be decoded
    pub fn load_history(&self, records: &[HistoryRecord]) -> Result<TariffPlan, PlanError> {
        let last = last_record(records).ok_or(PlanError::EmptyHistory)?;
        let family = self.resolve(last.variant())?;
        TariffPlan::from_history(family, records)
    }

    /// Build a plan from explicit storage fields.
    ///
    /// # Errors
    ///
    /// - `UnknownVariant` if `data.plan_id` is not registered
    /// - `FamilyMismatch` if `data.plan_type` is not the resolved family's id
    /// - `Facet` if option data is malformed
    pub fn load_snapshot_data(&self, data: &SnapshotData) -> Result<TariffPlan, PlanError> {
        let family = self.resolve(PlanVariantId::new(data.plan_id))?;
        TariffPlan::from_snapshot_data(family, data)
    }
}

//! engine::family
//!
//! Plan families as configuration values.
//!
//! # Architecture
//!
//! A [`PlanFamily`] describes everything that distinguishes one kind of
//! plan from another: which facets it carries and in which order they are
//! judged, the tier catalog its limit walks, the family-specific limit rule
//! switches, the occupancy threshold that starts a trial, and the defaults
//! used when stored data does not mention a facet.
//!
//! The evaluation engine in [`crate::engine::plan`] is generic over this
//! value. Families are shared read-only between plans through `Arc`.
//!
//! # Example
//!
//! ```
//! use tariffwork::core::catalog::TierCatalog;
//! use tariffwork::core::types::FacetKey;
//! use tariffwork::engine::family::PlanFamily;
//!
//! let catalog = TierCatalog::new(vec![10, 20, 30], vec![10]).unwrap();
//! let family = PlanFamily::new(
//!     "seats",
//!     2000,
//!     vec![FacetKey::Limit, FacetKey::RestrictPolicy],
//!     Some(catalog),
//! )
//! .unwrap();
//!
//! assert!(family.has_facet(FacetKey::Limit));
//! assert!(!family.has_facet(FacetKey::Demo));
//! assert!(family.limit_option(25).is_err());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::options::{
    overlay, DemoWindow, ExtendPolicy, ExtendRule, FacetData, FacetError, Limit, PlanOption,
    RestrictPolicy,
};
use super::plan::PlanError;
use crate::core::catalog::TierCatalog;
use crate::core::config::{FamilyConfig, LimitRulesConfig};
use crate::core::types::{FacetKey, PlanVariantId, Timestamp};

/// Family-specific limit rule switches. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitRules {
    /// A pure non-activating prolongation may proceed while the limit is exceeded.
    pub exceed_allows_plain_prolongation: bool,
    /// Only activation is allowed while a trial can still be started.
    pub block_until_trial_started: bool,
    /// Non-prolonging changes are free while a trial runs.
    pub free_changes_during_trial: bool,
}

impl From<&LimitRulesConfig> for LimitRules {
    fn from(config: &LimitRulesConfig) -> Self {
        Self {
            exceed_allows_plain_prolongation: config
                .exceed_allows_plain_prolongation
                .unwrap_or(false),
            block_until_trial_started: config.block_until_trial_started.unwrap_or(false),
            free_changes_during_trial: config.free_changes_during_trial.unwrap_or(false),
        }
    }
}

/// Values used when stored data does not mention a facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetDefaults {
    /// Default tier; the smallest tier when unset.
    pub limit: Option<u32>,
    pub extend_rule: ExtendRule,
    pub restrict_active_from: Timestamp,
    pub demo_active_until: Timestamp,
}

impl Default for FacetDefaults {
    fn default() -> Self {
        Self {
            limit: None,
            extend_rule: ExtendRule::Free,
            restrict_active_from: 0,
            demo_active_until: 0,
        }
    }
}

/// Description of one plan family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFamily {
    name: String,
    id: u32,
    facets: Vec<FacetKey>,
    catalog: Option<TierCatalog>,
    limit_rules: LimitRules,
    trial_threshold: Option<u32>,
    defaults: FacetDefaults,
    /// Empty when the family does not restrict its variants.
    variants: BTreeSet<PlanVariantId>,
}

impl PlanFamily {
    /// Create a family with default rules.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidFamily` if no facets are given, a facet is
    /// listed twice, or the limit facet is present without a catalog.
    pub fn new(
        name: impl Into<String>,
        id: u32,
        facets: Vec<FacetKey>,
        catalog: Option<TierCatalog>,
    ) -> Result<Self, PlanError> {
        let name = name.into();

        if facets.is_empty() {
            return Err(PlanError::InvalidFamily(format!(
                "family '{}' has no facets",
                name
            )));
        }

        for (index, facet) in facets.iter().enumerate() {
            if facets[..index].contains(facet) {
                return Err(PlanError::InvalidFamily(format!(
                    "family '{}' lists facet '{}' twice",
                    name, facet
                )));
            }
        }

        if facets.contains(&FacetKey::Limit) && catalog.is_none() {
            return Err(PlanError::InvalidFamily(format!(
                "family '{}' has a limit facet but no tier catalog",
                name
            )));
        }

        Ok(Self {
            name,
            id,
            facets,
            catalog,
            limit_rules: LimitRules::default(),
            trial_threshold: None,
            defaults: FacetDefaults::default(),
            variants: BTreeSet::new(),
        })
    }

    /// Build a family from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &FamilyConfig) -> Result<Self, PlanError> {
        config.validate()?;

        let catalog = if config.has_facet(FacetKey::Limit) {
            Some(config.tier_catalog()?)
        } else {
            None
        };

        let extend_rule = match &config.defaults.extend_policy {
            Some(rule) => rule.parse()?,
            None => ExtendRule::Free,
        };

        let defaults = FacetDefaults {
            limit: config.defaults.limit,
            extend_rule,
            restrict_active_from: config.defaults.restrict_active_from.unwrap_or(0),
            demo_active_until: config.defaults.demo_active_until.unwrap_or(0),
        };

        Ok(Self::new(&config.name, config.id, config.facets.clone(), catalog)?
            .with_limit_rules(LimitRules::from(&config.limit_rules))
            .with_trial_threshold(config.trial_threshold)
            .with_defaults(defaults)
            .with_variants(config.variants.iter().copied().map(PlanVariantId::new)))
    }

    pub fn with_limit_rules(mut self, rules: LimitRules) -> Self {
        self.limit_rules = rules;
        self
    }

    /// Occupancy above which a free extend policy enters trial.
    pub fn with_trial_threshold(mut self, threshold: Option<u32>) -> Self {
        self.trial_threshold = threshold;
        self
    }

    pub fn with_defaults(mut self, defaults: FacetDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Declare the variant ids that belong to this family.
    pub fn with_variants(mut self, variants: impl IntoIterator<Item = PlanVariantId>) -> Self {
        self.variants.extend(variants);
        self
    }

    /// Whether stored data of `variant` may be loaded into this family.
    ///
    /// A family without declared variants admits every id.
    pub fn admits_variant(&self, variant: PlanVariantId) -> bool {
        self.variants.is_empty() || self.variants.contains(&variant)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric family type written into exported snapshots.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Facets in judgment order.
    pub fn facets(&self) -> &[FacetKey] {
        &self.facets
    }

    pub fn has_facet(&self, facet: FacetKey) -> bool {
        self.facets.contains(&facet)
    }

    pub fn catalog(&self) -> Option<&TierCatalog> {
        self.catalog.as_ref()
    }

    pub fn limit_rules(&self) -> LimitRules {
        self.limit_rules
    }

    pub fn trial_threshold(&self) -> Option<u32> {
        self.trial_threshold
    }

    pub fn defaults(&self) -> &FacetDefaults {
        &self.defaults
    }

    /// Build a limit option for this family.
    ///
    /// # Errors
    ///
    /// Returns an error if the family has no limit facet or the value is not a tier.
    pub fn limit_option(&self, value: u32) -> Result<PlanOption, FacetError> {
        match self.catalog() {
            Some(catalog) if self.has_facet(FacetKey::Limit) => {
                Ok(Limit::new(value, catalog)?.into())
            }
            _ => Err(FacetError::NotInFamily(FacetKey::Limit)),
        }
    }

    /// Stored fields of a facet's default value.
    pub fn default_data(&self, facet: FacetKey) -> FacetData {
        let mut data = FacetData::new();
        match facet {
            FacetKey::Limit => {
                let smallest = self
                    .catalog
                    .as_ref()
                    .and_then(|catalog| catalog.tiers().first().copied())
                    .unwrap_or_default();
                let value = self.defaults.limit.unwrap_or(smallest);
                data.insert("value".to_string(), Value::from(value));
            }
            FacetKey::ExtendPolicy => {
                data.insert(
                    "rule".to_string(),
                    Value::from(self.defaults.extend_rule.as_str()),
                );
            }
            FacetKey::RestrictPolicy => {
                data.insert(
                    "active_from".to_string(),
                    Value::from(self.defaults.restrict_active_from),
                );
            }
            FacetKey::Demo => {
                data.insert(
                    "active_till".to_string(),
                    Value::from(self.defaults.demo_active_until),
                );
            }
        }
        data
    }

    /// Decode one facet, overlaying `data` onto the facet default.
    ///
    /// # Errors
    ///
    /// Returns an error if the facet is not part of the family or the merged
    /// fields are malformed.
    pub fn decode(&self, facet: FacetKey, data: Option<&FacetData>) -> Result<PlanOption, FacetError> {
        if !self.has_facet(facet) {
            return Err(FacetError::NotInFamily(facet));
        }

        let merged = overlay(self.default_data(facet), data);
        let option = match facet {
            FacetKey::Limit => {
                let catalog = self
                    .catalog
                    .as_ref()
                    .ok_or(FacetError::NotInFamily(FacetKey::Limit))?;
                Limit::decode(&merged, catalog)?.into()
            }
            FacetKey::ExtendPolicy => ExtendPolicy::decode(&merged)?.into(),
            FacetKey::RestrictPolicy => RestrictPolicy::decode(&merged)?.into(),
            FacetKey::Demo => DemoWindow::decode(&merged)?.into(),
        };
        Ok(option)
    }

    /// Decode every facet of the family from a storage option list.
    ///
    /// Facets missing from `option_list` take their defaults. Entries for
    /// facets outside the family are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error.
    pub fn decode_all(
        &self,
        option_list: &BTreeMap<String, FacetData>,
    ) -> Result<BTreeMap<FacetKey, PlanOption>, FacetError> {
        self.facets
            .iter()
            .map(|facet| {
                let option = self.decode(*facet, option_list.get(facet.as_str()))?;
                Ok((*facet, option))
            })
            .collect()
    }
}

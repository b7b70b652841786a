//! core::config::schema
//!
//! Catalog configuration schema types.
//!
//! # Catalog Document
//!
//! A catalog document lists plan families. Each family names its variant
//! ids, its ordered facets, its tier catalog (as spans), and the rule
//! switches that distinguish it from other families.
//!
//! # Validation
//!
//! Values are validated after parsing: spans must be well formed, the
//! expanded catalog strictly ascending, defaults consistent with facets.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::catalog::TierCatalog;
use crate::core::types::FacetKey;

/// Extend policy rules accepted in `defaults.extend_policy`.
pub const VALID_EXTEND_RULES: &[&str] = &["free", "trial", "never"];

/// One plan family.
///
/// # Example
///
/// ```toml
/// [[family]]
/// name = "member_count"
/// id = 1000
/// variants = [1001]
/// facets = ["extend_policy", "limit", "restrict_policy"]
/// free_tiers = [10]
/// trial_threshold = 10
///
/// [[family.tiers]]
/// from = 10
/// to = 100
/// step = 5
///
/// [family.limit_rules]
/// block_until_trial_started = true
/// free_changes_during_trial = true
///
/// [family.defaults]
/// limit = 10
/// extend_policy = "free"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FamilyConfig {
    /// Family name, used in logs and errors
    pub name: String,

    /// Numeric family type written into exported snapshots
    pub id: u32,

    /// Plan variant ids belonging to this family
    pub variants: Vec<u32>,

    /// Facets in evaluation order
    pub facets: Vec<FacetKey>,

    /// Tier spans, concatenated in order
    #[serde(default)]
    pub tiers: Vec<TierSpan>,

    /// Tiers available without a reason
    #[serde(default)]
    pub free_tiers: Vec<u32>,

    /// Occupancy above which a free extend policy enters trial
    pub trial_threshold: Option<u32>,

    /// Family-specific limit rule switches
    #[serde(default)]
    pub limit_rules: LimitRulesConfig,

    /// Facet defaults used when neither data nor history supplies a value
    #[serde(default)]
    pub defaults: FacetDefaultsConfig,
}

impl FamilyConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "family name cannot be empty".to_string(),
            ));
        }

        if self.variants.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "family '{}' declares no variants",
                self.name
            )));
        }

        if self.facets.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "family '{}' declares no facets",
                self.name
            )));
        }

        let mut seen = Vec::with_capacity(self.facets.len());
        for facet in &self.facets {
            if seen.contains(facet) {
                return Err(ConfigError::InvalidValue(format!(
                    "family '{}' lists facet '{}' twice",
                    self.name, facet
                )));
            }
            seen.push(*facet);
        }

        for span in &self.tiers {
            span.validate()?;
        }

        if self.has_facet(FacetKey::Limit) {
            let catalog = self.tier_catalog()?;
            if let Some(limit) = self.defaults.limit {
                catalog.require(limit).map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "family '{}' default limit: {}",
                        self.name, e
                    ))
                })?;
            }
        } else if !self.tiers.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "family '{}' has tiers but no limit facet",
                self.name
            )));
        }

        self.defaults.validate()
    }

    /// Whether the family carries a facet.
    pub fn has_facet(&self, facet: FacetKey) -> bool {
        self.facets.contains(&facet)
    }

    /// Expand the tier spans into a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the spans do not form a valid catalog.
    pub fn tier_catalog(&self) -> Result<TierCatalog, ConfigError> {
        let tiers: Vec<u32> = self.tiers.iter().flat_map(TierSpan::values).collect();
        TierCatalog::new(tiers, self.free_tiers.clone()).map_err(|e| {
            ConfigError::InvalidValue(format!("family '{}' catalog: {}", self.name, e))
        })
    }
}

/// Arithmetic run of tiers: `from, from + step, ..., <= to`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TierSpan {
    pub from: u32,
    pub to: u32,
    #[serde(default = "TierSpan::default_step")]
    pub step: u32,
}

impl TierSpan {
    fn default_step() -> u32 {
        1
    }

    /// Validate the span bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "tier span {}..={} has zero step",
                self.from, self.to
            )));
        }
        if self.from > self.to {
            return Err(ConfigError::InvalidValue(format!(
                "tier span starts after it ends ({} > {})",
                self.from, self.to
            )));
        }
        Ok(())
    }

    /// Tiers covered by the span.
    pub fn values(&self) -> impl Iterator<Item = u32> {
        let step = self.step.max(1) as usize;
        (self.from..=self.to).step_by(step)
    }
}

/// Limit rule switches.
///
/// Unset switches default to `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LimitRulesConfig {
    /// A pure prolongation may proceed while occupancy exceeds the limit
    pub exceed_allows_plain_prolongation: Option<bool>,

    /// Nothing but activation is allowed while the trial is unused
    pub block_until_trial_started: Option<bool>,

    /// Non-prolonging changes are free while the trial is active
    pub free_changes_during_trial: Option<bool>,
}

/// Facet defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FacetDefaultsConfig {
    /// Default limit tier (defaults to the smallest tier)
    pub limit: Option<u32>,

    /// Default extend policy rule (defaults to "free")
    pub extend_policy: Option<String>,

    /// Default restriction cutoff (defaults to 0, no restriction)
    pub restrict_active_from: Option<i64>,

    /// Default demo expiry (defaults to 0)
    pub demo_active_until: Option<i64>,
}

impl FacetDefaultsConfig {
    /// Validate the defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rule) = &self.extend_policy {
            if !VALID_EXTEND_RULES.contains(&rule.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid extend policy '{}', must be one of: {}",
                    rule,
                    VALID_EXTEND_RULES.join(", ")
                )));
            }
        }
        Ok(())
    }
}

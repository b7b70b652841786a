//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Timestamp`] - Unix time in seconds; `0` means "infinite" for active-until dates
//! - [`PlanVariantId`] - Numeric identifier of a concrete plan variant
//! - [`FacetKey`] - Name of one independently negotiable plan facet
//!
//! # Validation
//!
//! Facet keys are parsed from storage strings at construction time. An
//! unknown facet name cannot be represented.
//!
//! # Examples
//!
//! ```
//! use tariffwork::core::types::{FacetKey, PlanVariantId};
//!
//! let key: FacetKey = "extend_policy".parse().unwrap();
//! assert_eq!(key, FacetKey::ExtendPolicy);
//! assert_eq!(key.as_str(), "extend_policy");
//!
//! assert!("colour".parse::<FacetKey>().is_err());
//! assert_eq!(PlanVariantId::new(1001).to_string(), "1001");
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Active-until value that marks a plan as infinite.
pub const INFINITE: Timestamp = 0;

/// Deadline that never passes.
pub const UNBOUNDED: Timestamp = Timestamp::MAX;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown facet: {0}")]
    UnknownFacet(String),
}

/// Identifier of a concrete plan variant.
///
/// The engine never interprets the number; it is only a registry lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanVariantId(u32);

impl PlanVariantId {
    /// Wrap a raw variant id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for PlanVariantId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlanVariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One independently negotiable dimension of plan state.
///
/// Ordering follows declaration order and is used wherever facets are
/// iterated without an explicit family ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FacetKey {
    /// Tiered capacity ceiling.
    Limit,
    /// Auto-extension automaton (free → trial → never).
    ExtendPolicy,
    /// Access cutoff timestamp.
    RestrictPolicy,
    /// Demo period expiry marker.
    Demo,
}

impl FacetKey {
    /// All known facets.
    pub const ALL: [FacetKey; 4] = [
        FacetKey::Limit,
        FacetKey::ExtendPolicy,
        FacetKey::RestrictPolicy,
        FacetKey::Demo,
    ];

    /// Storage name of the facet.
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKey::Limit => "limit",
            FacetKey::ExtendPolicy => "extend_policy",
            FacetKey::RestrictPolicy => "restrict_policy",
            FacetKey::Demo => "demo",
        }
    }
}

impl FromStr for FacetKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacetKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| TypeError::UnknownFacet(s.to_string()))
    }
}

impl TryFrom<String> for FacetKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FacetKey> for String {
    fn from(key: FacetKey) -> Self {
        key.as_str().to_string()
    }
}

impl std::fmt::Display for FacetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

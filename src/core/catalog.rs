//! core::catalog
//!
//! Ordered tier catalog for capacity limits.
//!
//! The catalog values themselves are supplied from outside (see
//! [`crate::core::config`]). This module only validates them and walks them.
//!
//! # Invariants
//!
//! - A catalog is non-empty and strictly ascending
//! - Every free tier is a member of the catalog
//!
//! # Example
//!
//! ```
//! use tariffwork::core::catalog::TierCatalog;
//!
//! let catalog = TierCatalog::new(vec![10, 20, 30], vec![10]).unwrap();
//!
//! assert!(catalog.is_free(10));
//! assert_eq!(catalog.smallest_fitting(11), 20);
//! assert_eq!(catalog.smallest_fitting(500), 30);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from catalog validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("tier catalog is empty")]
    Empty,

    #[error("tier catalog is not strictly ascending at {0}")]
    NotAscending(u32),

    #[error("free tier {0} is not in the catalog")]
    UnknownFreeTier(u32),

    #[error("tier {0} is not in the catalog")]
    UnknownTier(u32),
}

/// Strictly ascending list of allowed limit values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog", into = "RawCatalog")]
pub struct TierCatalog {
    tiers: Vec<u32>,
    free: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct RawCatalog {
    tiers: Vec<u32>,
    #[serde(default)]
    free: Vec<u32>,
}

impl TierCatalog {
    /// Create a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the tiers are empty or not strictly ascending, or
    /// if a free tier is not one of the tiers.
    pub fn new(tiers: Vec<u32>, free: Vec<u32>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::Empty);
        }

        if let Some(pair) = tiers.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(CatalogError::NotAscending(pair[1]));
        }

        if let Some(tier) = free.iter().find(|tier| tiers.binary_search(*tier).is_err()) {
            return Err(CatalogError::UnknownFreeTier(*tier));
        }

        Ok(Self { tiers, free })
    }

    /// All tiers in ascending order.
    pub fn tiers(&self) -> &[u32] {
        &self.tiers
    }

    /// Tiers available without a reason.
    pub fn free_tiers(&self) -> &[u32] {
        &self.free
    }

    /// Check membership.
    pub fn contains(&self, value: u32) -> bool {
        self.tiers.binary_search(&value).is_ok()
    }

    /// Check membership, returning the tier or an error.
    pub fn require(&self, value: u32) -> Result<u32, CatalogError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(CatalogError::UnknownTier(value))
        }
    }

    /// Whether a tier is flagged free.
    pub fn is_free(&self, value: u32) -> bool {
        self.free.contains(&value)
    }

    /// Largest tier.
    pub fn max(&self) -> u32 {
        // Non-empty by construction.
        self.tiers.last().copied().unwrap_or_default()
    }

    /// Smallest tier that accommodates `required`, or the largest tier if none does.
    pub fn smallest_fitting(&self, required: u32) -> u32 {
        self.tiers
            .iter()
            .copied()
            .find(|tier| *tier >= required)
            .unwrap_or_else(|| self.max())
    }
}

impl TryFrom<RawCatalog> for TierCatalog {
    type Error = CatalogError;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        TierCatalog::new(raw.tiers, raw.free)
    }
}

impl From<TierCatalog> for RawCatalog {
    fn from(catalog: TierCatalog) -> Self {
        RawCatalog {
            tiers: catalog.tiers,
            free: catalog.free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TierCatalog {
        TierCatalog::new(vec![10, 15, 20, 50], vec![10]).unwrap()
    }

    mod validation {
        use super::*;

        #[test]
        fn empty_rejected() {
            assert_eq!(TierCatalog::new(vec![], vec![]), Err(CatalogError::Empty));
        }

        #[test]
        fn unsorted_rejected() {
            assert_eq!(
                TierCatalog::new(vec![10, 30, 20], vec![]),
                Err(CatalogError::NotAscending(20))
            );
        }

        #[test]
        fn duplicate_rejected() {
            assert_eq!(
                TierCatalog::new(vec![10, 10], vec![]),
                Err(CatalogError::NotAscending(10))
            );
        }

        #[test]
        fn foreign_free_tier_rejected() {
            assert_eq!(
                TierCatalog::new(vec![10, 20], vec![5]),
                Err(CatalogError::UnknownFreeTier(5))
            );
        }

        #[test]
        fn require_reports_unknown_tier() {
            assert_eq!(catalog().require(15), Ok(15));
            assert_eq!(catalog().require(16), Err(CatalogError::UnknownTier(16)));
        }
    }

    mod walking {
        use super::*;

        #[test]
        fn smallest_fitting_picks_first_tier_at_or_above() {
            let c = catalog();
            assert_eq!(c.smallest_fitting(0), 10);
            assert_eq!(c.smallest_fitting(10), 10);
            assert_eq!(c.smallest_fitting(11), 15);
            assert_eq!(c.smallest_fitting(20), 20);
            assert_eq!(c.smallest_fitting(21), 50);
        }

        #[test]
        fn smallest_fitting_falls_back_to_max() {
            assert_eq!(catalog().smallest_fitting(51), 50);
        }
    }

    mod serde_format {
        use super::*;

        #[test]
        fn deserialize_validates() {
            let ok: TierCatalog = serde_json::from_str(r#"{"tiers":[1,2],"free":[1]}"#).unwrap();
            assert!(ok.is_free(1));
            assert!(serde_json::from_str::<TierCatalog>(r#"{"tiers":[2,1]}"#).is_err());
        }
    }
}

//! core::config
//!
//! Catalog configuration schema and loading.
//!
//! # Overview
//!
//! Plan families are configuration values, not types. A catalog document
//! (TOML) describes every family the registry should know about: its
//! variant ids, its facets, its tier catalog and its rule switches.
//!
//! # Locations
//!
//! - [`CatalogConfig::load`] reads an explicit path
//! - [`CatalogConfig::load_default`] reads `$TARIFFWORK_CATALOG`
//!
//! # Example
//!
//! ```
//! use tariffwork::core::config::CatalogConfig;
//!
//! let config = CatalogConfig::from_toml_str(r#"
//!     [[family]]
//!     name = "seats"
//!     id = 2000
//!     variants = [2001]
//!     facets = ["limit", "restrict_policy", "demo"]
//!     free_tiers = [10]
//!
//!     [[family.tiers]]
//!     from = 10
//!     to = 100
//!     step = 10
//! "#).unwrap();
//!
//! assert_eq!(config.family.len(), 1);
//! assert_eq!(config.family[0].tier_catalog().unwrap().max(), 100);
//! ```

pub mod schema;

pub use schema::{FacetDefaultsConfig, FamilyConfig, LimitRulesConfig, TierSpan};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the default catalog file.
pub const CATALOG_ENV: &str = "TARIFFWORK_CATALOG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("no catalog configured (set {CATALOG_ENV})")]
    NotConfigured,
}

/// Catalog document: every known plan family.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Plan families
    pub family: Vec<FamilyConfig>,
}

impl CatalogConfig {
    /// Load and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: CatalogConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), families = config.family.len(), "catalog loaded");
        Ok(config)
    }

    /// Load the catalog named by `$TARIFFWORK_CATALOG`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` if the variable is unset, or any
    /// error from [`CatalogConfig::load`].
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CATALOG_ENV).ok_or(ConfigError::NotConfigured)?;
        Self::load(Path::new(&path))
    }

    /// Parse and validate catalog text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or validated.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CatalogConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every family and the uniqueness of names, ids and variants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` on the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        let mut variants = HashSet::new();

        for family in &self.family {
            family.validate()?;

            if !names.insert(family.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate family name '{}'",
                    family.name
                )));
            }
            if !ids.insert(family.id) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate family id {}",
                    family.id
                )));
            }
            for variant in &family.variants {
                if !variants.insert(*variant) {
                    return Err(ConfigError::InvalidValue(format!(
                        "variant {} is declared by more than one family",
                        variant
                    )));
                }
            }
        }

        Ok(())
    }

    /// Find a family by name.
    pub fn family(&self, name: &str) -> Option<&FamilyConfig> {
        self.family.iter().find(|f| f.name == name)
    }
}

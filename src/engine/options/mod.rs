//! engine::options
//!
//! Pluggable rule components, one per plan facet.
//!
//! # Architecture
//!
//! Every facet of a plan is governed by one option type implementing
//! [`Facet`]. An option is an immutable value; evaluating an alteration
//! never mutates it. Instead the engine asks each current option for a
//! replacement that suits the prospective state, and then asks it to judge
//! the transition from itself to the prospective option.
//!
//! ```text
//! current option --propose_replacement--> prospective option
//! current option --judge(prospective)----> AvailabilityStatus
//! ```
//!
//! [`PlanOption`] is the closed sum of all option kinds and dispatches to
//! the per-kind implementations.
//!
//! # Invariants
//!
//! - `propose_replacement` is only consulted when the caller did not supply
//!   a desired option for the facet
//! - Every proposal sees the same partial prospective snapshot: dates plus
//!   caller-supplied options only
//! - `judge` never fails; business rejections are statuses
//! - Facet data is decoded by overlaying raw fields onto family defaults

pub mod demo;
pub mod extend_policy;
pub mod limit;
pub mod restrict_policy;

pub use demo::DemoWindow;
pub use extend_policy::{ExtendPolicy, ExtendRule};
pub use limit::Limit;
pub use restrict_policy::RestrictPolicy;

use serde_json::{Map, Value};
use thiserror::Error;

use super::action::ActionContext;
use super::alteration::AlterationRequest;
use super::circumstance::Circumstance;
use super::family::PlanFamily;
use super::snapshot::PlanSnapshot;
use crate::core::availability::AvailabilityStatus;
use crate::core::catalog::CatalogError;
use crate::core::types::FacetKey;

/// Raw facet fields as stored in records and snapshot data.
pub type FacetData = Map<String, Value>;

/// Errors from decoding or constructing options.
#[derive(Debug, Error)]
pub enum FacetError {
    #[error("malformed '{facet}' data: {source}")]
    Malformed {
        facet: FacetKey,
        source: serde_json::Error,
    },

    #[error("facet '{0}' is not part of the plan family")]
    NotInFamily(FacetKey),

    #[error("unknown extend policy rule: {0}")]
    UnknownRule(String),

    #[error("limit: {0}")]
    Catalog(#[from] CatalogError),
}

/// Everything an option can look at while proposing or judging.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub family: &'a PlanFamily,
    pub circumstance: &'a Circumstance,
    pub action: &'a ActionContext,
    pub request: &'a AlterationRequest,
    /// Snapshot the plan holds now.
    pub current: &'a PlanSnapshot,
    /// Snapshot being proposed. Partial while proposals are collected.
    pub prospective: &'a PlanSnapshot,
}

/// Behaviour shared by every option kind.
pub trait Facet: Clone + PartialEq + Into<PlanOption> {
    /// Facet governed by this option kind.
    const KEY: FacetKey;

    /// Borrow this kind out of a [`PlanOption`].
    fn project(option: &PlanOption) -> Option<&Self>;

    /// Whether `other` holds the same setting as `self`.
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }

    /// Whether the option satisfies the environment.
    fn is_fit(&self, _circumstance: &Circumstance) -> bool {
        true
    }

    /// Value this facet should take in the prospective snapshot.
    fn propose_replacement(&self, _transition: &Transition<'_>) -> Self {
        self.clone()
    }

    /// Judge moving from `self` to the prospective option of the same facet.
    fn judge(&self, _transition: &Transition<'_>) -> AvailabilityStatus {
        AvailabilityStatus::detached()
    }

    /// Storage form of the option.
    fn export(&self) -> FacetData;

    /// Prospective option of this facet, if one is present.
    fn prospective<'a>(transition: &Transition<'a>) -> Option<&'a Self>
    where
        Self: 'a,
    {
        transition
            .prospective
            .option(Self::KEY)
            .and_then(Self::project)
    }
}

/// One option of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOption {
    Limit(Limit),
    ExtendPolicy(ExtendPolicy),
    RestrictPolicy(RestrictPolicy),
    Demo(DemoWindow),
}

impl PlanOption {
    /// Facet the option governs.
    pub fn key(&self) -> FacetKey {
        match self {
            PlanOption::Limit(_) => Limit::KEY,
            PlanOption::ExtendPolicy(_) => ExtendPolicy::KEY,
            PlanOption::RestrictPolicy(_) => RestrictPolicy::KEY,
            PlanOption::Demo(_) => DemoWindow::KEY,
        }
    }

    /// Whether `other` is the same kind with the same setting.
    pub fn is_same(&self, other: &PlanOption) -> bool {
        match (self, other) {
            (PlanOption::Limit(a), PlanOption::Limit(b)) => a.is_same(b),
            (PlanOption::ExtendPolicy(a), PlanOption::ExtendPolicy(b)) => a.is_same(b),
            (PlanOption::RestrictPolicy(a), PlanOption::RestrictPolicy(b)) => a.is_same(b),
            (PlanOption::Demo(a), PlanOption::Demo(b)) => a.is_same(b),
            _ => false,
        }
    }

    pub fn is_fit(&self, circumstance: &Circumstance) -> bool {
        match self {
            PlanOption::Limit(o) => o.is_fit(circumstance),
            PlanOption::ExtendPolicy(o) => o.is_fit(circumstance),
            PlanOption::RestrictPolicy(o) => o.is_fit(circumstance),
            PlanOption::Demo(o) => o.is_fit(circumstance),
        }
    }

    pub fn propose_replacement(&self, transition: &Transition<'_>) -> PlanOption {
        match self {
            PlanOption::Limit(o) => o.propose_replacement(transition).into(),
            PlanOption::ExtendPolicy(o) => o.propose_replacement(transition).into(),
            PlanOption::RestrictPolicy(o) => o.propose_replacement(transition).into(),
            PlanOption::Demo(o) => o.propose_replacement(transition).into(),
        }
    }

    pub fn judge(&self, transition: &Transition<'_>) -> AvailabilityStatus {
        match self {
            PlanOption::Limit(o) => o.judge(transition),
            PlanOption::ExtendPolicy(o) => o.judge(transition),
            PlanOption::RestrictPolicy(o) => o.judge(transition),
            PlanOption::Demo(o) => o.judge(transition),
        }
    }

    pub fn export(&self) -> FacetData {
        match self {
            PlanOption::Limit(o) => o.export(),
            PlanOption::ExtendPolicy(o) => o.export(),
            PlanOption::RestrictPolicy(o) => o.export(),
            PlanOption::Demo(o) => o.export(),
        }
    }
}

impl From<Limit> for PlanOption {
    fn from(option: Limit) -> Self {
        PlanOption::Limit(option)
    }
}

impl From<ExtendPolicy> for PlanOption {
    fn from(option: ExtendPolicy) -> Self {
        PlanOption::ExtendPolicy(option)
    }
}

impl From<RestrictPolicy> for PlanOption {
    fn from(option: RestrictPolicy) -> Self {
        PlanOption::RestrictPolicy(option)
    }
}

impl From<DemoWindow> for PlanOption {
    fn from(option: DemoWindow) -> Self {
        PlanOption::Demo(option)
    }
}

/// Deserialize overlaid facet fields into a typed raw struct.
pub(crate) fn decode_fields<T>(facet: FacetKey, data: &FacetData) -> Result<T, FacetError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(Value::Object(data.clone()))
        .map_err(|source| FacetError::Malformed { facet, source })
}

/// Overlay `overlay` onto `base`, field by field.
pub(crate) fn overlay(mut base: FacetData, overlay: Option<&FacetData>) -> FacetData {
    if let Some(fields) = overlay {
        for (name, value) in fields {
            base.insert(name.clone(), value.clone());
        }
    }
    base
}

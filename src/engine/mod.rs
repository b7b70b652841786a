//! engine
//!
//! Plan families, facets and the alteration pipeline.
//!
//! # Architecture
//!
//! A [`PlanFamily`] is a configuration value: its ordered facets, its tier
//! catalog and its rule switches. Every [`TariffPlan`] belongs to one family
//! and evaluates alterations through one pipeline:
//!
//! ```text
//! Normalise -> BuildContext -> ProposeSnapshot -> Judge -> Merge -> Decide
//! ```
//!
//! Plans are loaded either from explicit storage fields ([`SnapshotData`])
//! or by replaying history ([`HistoryRecord`]); the [`PlanRegistry`] maps
//! stored variant ids to families for both paths.
//!
//! # Modules
//!
//! - [`action`] - Method, trial state and the derived action context
//! - [`alteration`] - Alteration requests and results
//! - [`circumstance`] - Observed usage an alteration is judged against
//! - [`family`] - Plan family definitions
//! - [`history`] - Replay of append-only history
//! - [`options`] - Facet values and their judgments
//! - [`plan`] - The tariff plan and its pipeline
//! - [`registry`] - Variant id lookup
//! - [`snapshot`] - Plan state and its storage form
//!
//! # Invariants
//!
//! - Families are shared read-only through `Arc`
//! - Unknown variant ids fail the load
//! - Preview and apply share one evaluation path

pub mod action;
pub mod alteration;
pub mod circumstance;
pub mod family;
pub mod history;
pub mod options;
pub mod plan;
pub mod registry;
pub mod snapshot;

pub use action::{ActionContext, ActiveReason, Method, TrialState};
pub use alteration::{
    ActionKind, AlterationRequest, AlterationResult, ExpectedActiveUntil, Prolongation,
    TrialBehaviour,
};
pub use circumstance::Circumstance;
pub use family::{FacetDefaults, LimitRules, PlanFamily};
pub use history::{replay, HistoryRecord, Replayed};
pub use options::{
    DemoWindow, ExtendPolicy, ExtendRule, Facet, FacetData, FacetError, Limit, PlanOption,
    RestrictPolicy,
};
pub use plan::{PlanError, TariffPlan};
pub use registry::PlanRegistry;
pub use snapshot::{PlanSnapshot, SnapshotData};

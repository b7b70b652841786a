//! engine::plan
//!
//! Tariff plan orchestration: preview and apply alterations.
//!
//! # Architecture
//!
//! A [`TariffPlan`] holds the snapshot it was loaded with (`original`) and
//! the snapshot it holds now (`current`). Every evaluation runs the same
//! pipeline, whether it is a preview or a mutating apply:
//!
//! ```text
//! Normalise -> BuildContext -> ProposeSnapshot -> Judge -> Merge -> Decide -> (Commit | Reject)
//! ```
//!
//! 1. **Normalise**: a desired free limit turns the request into an infinite
//!    prolongation
//! 2. **BuildContext**: derive [`ActionContext`] from the current state
//! 3. **ProposeSnapshot**: compute dates, then ask every facet without a
//!    caller-supplied option for a replacement
//! 4. **Judge**: structural checks, then per-facet judgments in family order
//! 5. **Merge**: ratchet every judgment and every extra predicate into the
//!    request's seeded availability
//! 6. **Decide**: commit, reject, or demand a reason
//!
//! Preview ([`TariffPlan::arrange_alteration`]) stops after Merge and hands
//! the narrowed request back. Apply ([`TariffPlan::apply_alteration`]) runs to
//! the end; with [`Method::Force`] it commits the proposal without judging.
//!
//! # Invariants
//!
//! - Only `apply_alteration` mutates a plan
//! - A rejected alteration leaves the plan untouched
//! - Preview and apply share one code path, so a previewed availability is
//!   the availability apply decides on
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tariffwork::core::availability::AvailabilityStatus;
//! use tariffwork::core::catalog::TierCatalog;
//! use tariffwork::core::types::FacetKey;
//! use tariffwork::engine::action::Method;
//! use tariffwork::engine::alteration::{ActionKind, AlterationRequest};
//! use tariffwork::engine::circumstance::Circumstance;
//! use tariffwork::engine::family::PlanFamily;
//! use tariffwork::engine::snapshot::SnapshotData;
//! use tariffwork::engine::plan::TariffPlan;
//!
//! let catalog = TierCatalog::new(vec![10, 20, 30], vec![10]).unwrap();
//! let family = Arc::new(
//!     PlanFamily::new("seats", 2000, vec![FacetKey::Limit], Some(catalog)).unwrap(),
//! );
//!
//! let now = 1_700_000_000;
//! let data = SnapshotData::new(2000, 2001, now + 86_400, 0);
//! let mut plan = TariffPlan::from_snapshot_data(family.clone(), &data).unwrap();
//!
//! let request = AlterationRequest::new(AvailabilityStatus::detached())
//!     .with_actions([ActionKind::Change])
//!     .with_option(family.limit_option(20).unwrap());
//!
//! let result = plan.apply_alteration(Method::Promo, request, &Circumstance::new(12), now);
//! assert!(result.is_success());
//! assert_eq!(plan.limit(), Some(20));
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::action::{ActionContext, ActiveReason, Method, TrialState};
use super::alteration::{
    ActionKind, AlterationRequest, AlterationResult, Prolongation, TrialBehaviour,
};
use super::circumstance::Circumstance;
use super::family::PlanFamily;
use super::history::{self, HistoryRecord};
use super::options::{ExtendRule, FacetError, PlanOption, Transition};
use super::snapshot::{PlanSnapshot, SnapshotData, VALID_TILL_FOREVER};
use crate::core::availability::{codes, Availability, AvailabilityStatus};
use crate::core::config::ConfigError;
use crate::core::types::{FacetKey, PlanVariantId, Timestamp, INFINITE};

/// Errors from building or loading plans.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("empty record list")]
    EmptyHistory,

    #[error("unknown plan variant: {0}")]
    UnknownVariant(PlanVariantId),

    #[error("plan type {found} does not match family '{family}' ({expected})")]
    FamilyMismatch {
        family: String,
        expected: u32,
        found: u32,
    },

    #[error("plan variant {variant} does not belong to family '{family}'")]
    VariantMismatch {
        family: String,
        variant: PlanVariantId,
    },

    #[error("invalid plan family: {0}")]
    InvalidFamily(String),

    #[error("facet error: {0}")]
    Facet(#[from] FacetError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// A plan variant with its current and original state.
#[derive(Debug, Clone)]
pub struct TariffPlan {
    variant: PlanVariantId,
    family: Arc<PlanFamily>,
    original: PlanSnapshot,
    current: PlanSnapshot,
}

impl TariffPlan {
    fn new(variant: PlanVariantId, family: Arc<PlanFamily>, snapshot: PlanSnapshot) -> Self {
        Self {
            variant,
            family,
            original: snapshot.clone(),
            current: snapshot,
        }
    }

    /// Build a plan from explicit storage fields.
    ///
    /// Facets missing from `data.option_list` take the family defaults.
    ///
    /// # Errors
    ///
    /// - `FamilyMismatch` if `data.plan_type` is not the family id
    /// - `VariantMismatch` if the family does not admit `data.plan_id`
    /// - `Facet` if option data is malformed or names an unknown tier
    pub fn from_snapshot_data(family: Arc<PlanFamily>, data: &SnapshotData) -> Result<Self, PlanError> {
        if data.plan_type != family.id() {
            return Err(PlanError::FamilyMismatch {
                family: family.name().to_string(),
                expected: family.id(),
                found: data.plan_type,
            });
        }
        check_variant(&family, PlanVariantId::new(data.plan_id))?;

        let options = family.decode_all(&data.option_list)?;
        let snapshot =
            PlanSnapshot::new(data.active_till, data.free_active_till).with_options(options);

        Ok(Self::new(PlanVariantId::new(data.plan_id), family, snapshot))
    }

    /// Rebuild a plan by replaying its history records.
    ///
    /// # Errors
    ///
    /// - `EmptyHistory` if `records` is empty
    /// - `VariantMismatch` if the family does not admit the latest record's variant
    /// - `Facet` if a folded facet cannot be decoded
    pub fn from_history(family: Arc<PlanFamily>, records: &[HistoryRecord]) -> Result<Self, PlanError> {
        let replayed = history::replay(&family, records)?;
        check_variant(&family, replayed.variant)?;
        Ok(Self::new(replayed.variant, family, replayed.snapshot))
    }

    pub fn variant(&self) -> PlanVariantId {
        self.variant
    }

    pub fn family(&self) -> &PlanFamily {
        &self.family
    }

    /// State the plan was loaded with.
    pub fn original(&self) -> &PlanSnapshot {
        &self.original
    }

    /// State the plan holds now.
    pub fn snapshot(&self) -> &PlanSnapshot {
        &self.current
    }

    /// Current limit tier, if the family has a limit.
    pub fn limit(&self) -> Option<u32> {
        self.current.limit().map(|limit| limit.value())
    }

    pub fn active_until(&self) -> Timestamp {
        self.current.active_until
    }

    pub fn free_active_until(&self) -> Timestamp {
        self.current.free_active_until
    }

    /// Whether the plan costs nothing at `time`.
    pub fn is_free(&self, time: Timestamp) -> bool {
        self.current.is_infinite() || self.is_limit_free() || self.current.free_active_until > time
    }

    /// Whether the plan is in force at `time`.
    pub fn is_active(&self, time: Timestamp) -> bool {
        self.current.is_infinite() || self.current.active_until > time || self.is_free(time)
    }

    /// Whether every option satisfies the environment.
    pub fn is_fit(&self, circumstance: &Circumstance) -> bool {
        self.current.options().all(|option| option.is_fit(circumstance))
    }

    /// Whether access is restricted at `time`, allowing `delta` seconds of grace.
    pub fn is_restricted(&self, time: Timestamp, delta: Timestamp) -> bool {
        self.current
            .restrict_policy()
            .is_some_and(|policy| policy.is_restricted(time, delta))
    }

    /// Whether access is restricted at `time`, using the circumstance's
    /// postpayment period as grace.
    pub fn is_restricted_with_grace(&self, time: Timestamp, circumstance: &Circumstance) -> bool {
        self.is_restricted(time, circumstance.postpayment_period)
    }

    /// Trial sub-state at `time`. Families without an extend policy have none.
    pub fn trial_state(&self, time: Timestamp) -> TrialState {
        match self.current.extend_policy() {
            Some(policy) if policy.is_trial_available() => TrialState::Available,
            Some(policy) if policy.is_trial(time) => TrialState::Active,
            _ => TrialState::None,
        }
    }

    pub fn is_trial(&self, time: Timestamp) -> bool {
        self.trial_state(time) == TrialState::Active
    }

    pub fn is_trial_available(&self, time: Timestamp) -> bool {
        self.trial_state(time) == TrialState::Available
    }

    pub fn extend_policy_rule(&self) -> Option<ExtendRule> {
        self.current.extend_policy().map(|policy| policy.rule())
    }

    pub fn restricted_access_from(&self) -> Option<Timestamp> {
        self.current.restrict_policy().map(|policy| policy.active_from())
    }

    pub fn demo_active_until(&self) -> Option<Timestamp> {
        self.current.demo().map(|demo| demo.active_until())
    }

    /// Whether the current state differs from the loaded one.
    pub fn has_changes(&self) -> bool {
        !self.current.is_same(&self.original)
    }

    /// Storage form of the current state.
    pub fn export_snapshot(&self) -> SnapshotData {
        SnapshotData {
            plan_type: self.family.id(),
            plan_id: self.variant.get(),
            valid_till: VALID_TILL_FOREVER,
            active_till: self.current.active_until,
            free_active_till: self.current.free_active_until,
            option_list: self.current.export_options(),
        }
    }

    /// Preview an alteration without changing the plan.
    ///
    /// Returns the request with its availability narrowed by every check,
    /// judgment and extra predicate.
    pub fn arrange_alteration(
        &self,
        request: AlterationRequest,
        circumstance: &Circumstance,
        time: Timestamp,
        method: Method,
    ) -> AlterationRequest {
        let mut request = self.normalise(request);
        let action = self.build_context(method, time);
        let prospective = self.propose(&request, circumstance, &action);

        self.arrange(&mut request, circumstance, &action, &prospective);

        tracing::debug!(
            family = %self.family.name(),
            variant = %self.variant,
            availability = %request.availability().availability(),
            code = request.availability().code(),
            "alteration arranged"
        );
        request
    }

    /// Evaluate an alteration and commit it when allowed.
    pub fn apply_alteration(
        &mut self,
        method: Method,
        request: AlterationRequest,
        circumstance: &Circumstance,
        time: Timestamp,
    ) -> AlterationResult {
        let mut request = self.normalise(request);
        let action = self.build_context(method, time);
        let prospective = self.propose(&request, circumstance, &action);

        if action.is_forced() {
            tracing::debug!(family = %self.family.name(), variant = %self.variant, "forced alteration committed");
            self.current = prospective;
            return AlterationResult::Applied { forced: true };
        }

        self.arrange(&mut request, circumstance, &action, &prospective);

        let status = request.availability();
        if !status.is_available() {
            tracing::debug!(
                family = %self.family.name(),
                variant = %self.variant,
                code = status.code(),
                message = status.message(),
                "alteration rejected"
            );
            return AlterationResult::rejected(status);
        }

        if status.requires_reason() && !action.has_reason() {
            tracing::debug!(family = %self.family.name(), variant = %self.variant, "alteration needs a reason");
            return AlterationResult::Rejected {
                code: codes::REASON_REQUIRED,
                message: "payment required".to_string(),
            };
        }

        tracing::debug!(
            family = %self.family.name(),
            variant = %self.variant,
            availability = %status.availability(),
            "alteration applied"
        );
        self.current = prospective;
        AlterationResult::Applied { forced: false }
    }

    /// Dates the plan would have after `request`.
    pub fn compute_active_dates(
        &self,
        request: &AlterationRequest,
        action: &ActionContext,
    ) -> (Timestamp, Timestamp) {
        let active_until = self.current.active_until;
        let free_active_until = self.current.free_active_until;
        let time = action.time();

        if !request.is_prolongation() {
            return (active_until, free_active_until);
        }

        match request.prolongation() {
            Prolongation::Infinite => (INFINITE, INFINITE),
            Prolongation::Set(value) => {
                let free = if action.is_promo() { value } else { free_active_until };
                (value, free)
            }
            Prolongation::Extend(delta) => {
                let extended = time.max(active_until).saturating_add(delta);
                let free = if action.is_promo() {
                    time.max(free_active_until).saturating_add(delta)
                } else {
                    free_active_until
                };
                (extended, free)
            }
            Prolongation::None => (active_until, free_active_until),
        }
    }

    fn is_limit_free(&self) -> bool {
        self.current
            .limit()
            .is_some_and(|limit| limit.is_free(&self.family))
    }

    fn normalise(&self, request: AlterationRequest) -> AlterationRequest {
        let wants_free_limit = matches!(
            request.desired(FacetKey::Limit),
            Some(PlanOption::Limit(limit)) if limit.is_free(&self.family)
        );

        if wants_free_limit {
            request
                .with_prolongation(Prolongation::Infinite)
                .add_action(ActionKind::Prolong)
        } else {
            request
        }
    }

    fn build_context(&self, method: Method, time: Timestamp) -> ActionContext {
        let mut reasons = Vec::new();

        if self.is_active(time) {
            if self.current.is_infinite() {
                reasons.push(ActiveReason::Infinite);
            }
            if self.current.active_until > time {
                reasons.push(ActiveReason::NotExpired);
            }
            if self.is_limit_free() {
                reasons.push(ActiveReason::FreeLimit);
            }
        }

        ActionContext::new(method, self.trial_state(time), reasons, time)
    }

    fn propose(
        &self,
        request: &AlterationRequest,
        circumstance: &Circumstance,
        action: &ActionContext,
    ) -> PlanSnapshot {
        let (active_until, free_active_until) = self.compute_active_dates(request, action);

        let mut partial = PlanSnapshot::new(active_until, free_active_until);
        for facet in self.family.facets() {
            if let Some(desired) = request.desired(*facet) {
                partial.set_option(desired.clone());
            }
        }

        let transition = Transition {
            family: &self.family,
            circumstance,
            action,
            request,
            current: &self.current,
            prospective: &partial,
        };

        let mut prospective = partial.clone();
        for facet in self.family.facets() {
            if request.desired(*facet).is_some() {
                continue;
            }
            if let Some(current) = self.current.option(*facet) {
                prospective.set_option(current.propose_replacement(&transition));
            }
        }

        prospective
    }

    fn arrange(
        &self,
        request: &mut AlterationRequest,
        circumstance: &Circumstance,
        action: &ActionContext,
        prospective: &PlanSnapshot,
    ) {
        let mut statuses = self.structural_checks(request, action);

        let transition = Transition {
            family: &self.family,
            circumstance,
            action,
            request,
            current: &self.current,
            prospective,
        };

        for facet in self.family.facets() {
            if let Some(current) = self.current.option(*facet) {
                let status = current.judge(&transition);
                tracing::trace!(
                    facet = %facet,
                    availability = %status.availability(),
                    code = status.code(),
                    "facet judged"
                );
                statuses.push(status);
            }
        }

        statuses.extend(request.extra_conditions().iter().map(|condition| condition(self)));

        for status in &statuses {
            request.narrow(status);
        }
    }

    fn structural_checks(
        &self,
        request: &AlterationRequest,
        action: &ActionContext,
    ) -> Vec<AvailabilityStatus> {
        let time = action.time();
        let is_active = self.is_active(time);
        let mut statuses = Vec::new();

        let changed = request.expected_prior().any(|expected| {
            self.current
                .option(expected.key())
                .map_or(true, |current| !current.is_same(expected))
        });
        if changed {
            statuses.push(unappropriated(codes::PLAN_WAS_CHANGED, "plan was changed"));
        }

        let expected = request.expected_active_until();
        if expected.is_declared() && is_active && !expected.matches(self.current.active_until) {
            statuses.push(unappropriated(
                codes::UNEXPECTED_EXPIRATION_DATE,
                "expiration date not equal to expected",
            ));
        }

        if !request.is_activation() && request.is_prolongation_extend() && !is_active {
            statuses.push(unappropriated(
                codes::ACTIVATION_REQUIRED,
                "plan must be activated first",
            ));
        }

        if request.is_activation() && is_active && !self.is_free(time) {
            statuses.push(unappropriated(codes::PLAN_IS_ACTIVE, "plan is already active"));
        }

        if request.has_trial_behaviour(TrialBehaviour::RequireAvailable)
            && !action.is_trial_available()
        {
            statuses.push(unappropriated(codes::TRIAL_UNAVAILABLE, "trial is not available"));
        }

        statuses
    }
}

fn unappropriated(code: u32, message: &str) -> AvailabilityStatus {
    AvailabilityStatus::rejection(Availability::UnavailableUnappropriated, code, message)
}

fn check_variant(family: &PlanFamily, variant: PlanVariantId) -> Result<(), PlanError> {
    if family.admits_variant(variant) {
        Ok(())
    } else {
        Err(PlanError::VariantMismatch {
            family: family.name().to_string(),
            variant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::TierCatalog;
    use crate::engine::alteration::ExpectedActiveUntil;
    use crate::engine::options::{DemoWindow, ExtendPolicy, Facet, RestrictPolicy};

    const NOW: Timestamp = 1_700_000_000;
    const DAY: Timestamp = 86_400;

    fn seats() -> Arc<PlanFamily> {
        let catalog = TierCatalog::new(vec![10, 20, 30, 50], vec![10]).unwrap();
        Arc::new(
            PlanFamily::new(
                "seats",
                2000,
                vec![FacetKey::Limit, FacetKey::RestrictPolicy, FacetKey::Demo],
                Some(catalog),
            )
            .unwrap(),
        )
    }

    fn plan(active_until: Timestamp, limit: u32) -> TariffPlan {
        let family = seats();
        let mut data = SnapshotData::new(2000, 2001, active_until, 0);
        data.option_list.insert(
            "limit".to_string(),
            family.limit_option(limit).unwrap().export(),
        );
        TariffPlan::from_snapshot_data(family, &data).unwrap()
    }

    fn request() -> AlterationRequest {
        AlterationRequest::new(AvailabilityStatus::detached())
    }

    mod surface {
        use super::*;

        #[test]
        fn defaults_fill_facets() {
            let plan = plan(NOW + DAY, 20);
            assert_eq!(plan.limit(), Some(20));
            assert_eq!(plan.restricted_access_from(), Some(0));
            assert_eq!(plan.demo_active_until(), Some(0));
            assert_eq!(plan.extend_policy_rule(), None);
            assert_eq!(plan.trial_state(NOW), TrialState::None);
        }

        #[test]
        fn free_tier_is_active_forever() {
            let plan = plan(NOW - DAY, 10);
            assert!(plan.is_free(NOW));
            assert!(plan.is_active(NOW));
        }

        #[test]
        fn expired_paid_plan_is_inactive() {
            let plan = plan(NOW - DAY, 20);
            assert!(!plan.is_free(NOW));
            assert!(!plan.is_active(NOW));
        }

        #[test]
        fn infinite_plan_is_free_and_active() {
            let plan = plan(INFINITE, 20);
            assert!(plan.is_free(NOW));
            assert!(plan.is_active(NOW));
        }

        #[test]
        fn free_active_until_makes_plan_free() {
            let family = seats();
            let mut data = SnapshotData::new(2000, 2001, NOW - DAY, NOW + DAY);
            data.option_list.insert(
                "limit".to_string(),
                family.limit_option(30).unwrap().export(),
            );
            let plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            assert!(plan.is_free(NOW));
            assert!(plan.is_active(NOW));
        }

        #[test]
        fn fit_follows_limit() {
            let plan = plan(NOW + DAY, 20);
            assert!(plan.is_fit(&Circumstance::new(20)));
            assert!(!plan.is_fit(&Circumstance::new(21)));
        }

        #[test]
        fn restriction_uses_grace() {
            let family = seats();
            let data = SnapshotData::new(2000, 2001, NOW, 0).with_facet(
                FacetKey::RestrictPolicy,
                RestrictPolicy::new(NOW).export(),
            );
            let plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            assert!(plan.is_restricted(NOW + 1, 0));
            let grace = Circumstance::new(0).with_postpayment_period(DAY);
            assert!(!plan.is_restricted_with_grace(NOW + 1, &grace));
            assert!(plan.is_restricted_with_grace(NOW + DAY + 1, &grace));
        }

        #[test]
        fn wrong_plan_type_rejected() {
            let data = SnapshotData::new(1000, 1001, NOW, 0);
            assert!(matches!(
                TariffPlan::from_snapshot_data(seats(), &data),
                Err(PlanError::FamilyMismatch { expected: 2000, found: 1000, .. })
            ));
        }

        #[test]
        fn history_of_foreign_variant_rejected() {
            let family = Arc::new(seats().as_ref().clone().with_variants([PlanVariantId::new(2001)]));
            let foreign = [HistoryRecord::new(1, 9999, NOW, 0)];
            assert!(matches!(
                TariffPlan::from_history(family.clone(), &foreign),
                Err(PlanError::VariantMismatch { variant, .. }) if variant.get() == 9999
            ));

            let own = [HistoryRecord::new(1, 2001, NOW, 0)];
            assert_eq!(
                TariffPlan::from_history(family.clone(), &own).unwrap().variant(),
                PlanVariantId::new(2001)
            );

            let data = SnapshotData::new(2000, 9999, NOW, 0);
            assert!(matches!(
                TariffPlan::from_snapshot_data(family, &data),
                Err(PlanError::VariantMismatch { .. })
            ));
        }

        #[test]
        fn undeclared_variants_are_admitted() {
            let records = [HistoryRecord::new(1, 9999, NOW, 0)];
            assert!(TariffPlan::from_history(seats(), &records).is_ok());
        }

        #[test]
        fn export_round_trips() {
            let plan = plan(NOW + DAY, 30);
            let exported = plan.export_snapshot();
            assert_eq!(exported.valid_till, VALID_TILL_FOREVER);
            let reloaded = TariffPlan::from_snapshot_data(seats(), &exported).unwrap();
            assert_eq!(reloaded.snapshot(), plan.snapshot());
            assert_eq!(reloaded.variant(), plan.variant());
        }
    }

    mod dates {
        use super::*;

        fn dates(method: Method, prolongation: Prolongation, active_until: Timestamp, free_until: Timestamp) -> (Timestamp, Timestamp) {
            let family = seats();
            let data = SnapshotData::new(2000, 2001, active_until, free_until);
            let plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            let action = plan.build_context(method, NOW);
            plan.compute_active_dates(&request().with_prolongation(prolongation), &action)
        }

        #[test]
        fn infinite_zeroes_both() {
            assert_eq!(dates(Method::Payment, Prolongation::Infinite, NOW, NOW), (0, 0));
        }

        #[test]
        fn set_copies_free_only_for_promo() {
            assert_eq!(dates(Method::Promo, Prolongation::Set(500), NOW, 7), (500, 500));
            assert_eq!(dates(Method::Payment, Prolongation::Set(500), NOW, 7), (500, 7));
        }

        #[test]
        fn extend_starts_from_later_of_now_and_expiry() {
            assert_eq!(
                dates(Method::Payment, Prolongation::Extend(DAY), NOW - 5, 0),
                (NOW + DAY, 0)
            );
            assert_eq!(
                dates(Method::Payment, Prolongation::Extend(DAY), NOW + 5, 0),
                (NOW + 5 + DAY, 0)
            );
        }

        #[test]
        fn promo_extend_moves_free_until() {
            assert_eq!(
                dates(Method::Promo, Prolongation::Extend(DAY), NOW + 5, NOW - 1),
                (NOW + 5 + DAY, NOW + DAY)
            );
        }

        #[test]
        fn no_prolong_action_keeps_dates() {
            let family = seats();
            let data = SnapshotData::new(2000, 2001, NOW + 5, 3);
            let plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            let action = plan.build_context(Method::Payment, NOW);
            let request = request()
                .with_actions([ActionKind::Change])
                .with_prolongation(Prolongation::Infinite);
            assert_eq!(plan.compute_active_dates(&request, &action), (NOW + 5, 3));
        }
    }

    mod pipeline {
        use super::*;

        #[test]
        fn context_reasons_follow_state() {
            let plan = plan(INFINITE, 10);
            let action = plan.build_context(Method::Detached, NOW);
            let reasons: Vec<_> = action.active_reasons().collect();
            assert_eq!(reasons, vec![ActiveReason::Infinite, ActiveReason::FreeLimit]);

            let expired = plan_expired();
            let action = expired.build_context(Method::Detached, NOW);
            assert!(!action.is_active());
        }

        fn plan_expired() -> TariffPlan {
            plan(NOW - DAY, 30)
        }

        #[test]
        fn free_limit_request_becomes_infinite() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Change])
                .with_option(plan.family().limit_option(10).unwrap());
            let normalised = plan.normalise(request);
            assert!(normalised.is_prolongation_infinite());
            assert!(normalised.is_change());
        }

        #[test]
        fn restrict_policy_follows_prospective_expiry() {
            let mut plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY));
            let result = plan.apply_alteration(Method::Payment, request, &Circumstance::new(5), NOW);
            assert!(result.is_success(), "{result:?}");
            assert_eq!(plan.active_until(), NOW + 2 * DAY);
            assert_eq!(plan.restricted_access_from(), Some(NOW + 2 * DAY));
            assert!(plan.has_changes());
        }

        #[test]
        fn reason_required_without_reason_rejected() {
            let mut plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY));
            let result = plan.apply_alteration(Method::Detached, request, &Circumstance::new(5), NOW);
            assert_eq!(result.code(), codes::REASON_REQUIRED);
            assert_eq!(result.message(), "payment required");
            assert!(!plan.has_changes());
        }

        #[test]
        fn force_skips_checks() {
            let mut plan = plan(NOW - DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY));
            let result = plan.apply_alteration(Method::Force, request, &Circumstance::new(5), NOW);
            assert_eq!(result, AlterationResult::Applied { forced: true });
            assert_eq!(plan.active_until(), NOW + DAY);
        }

        #[test]
        fn expected_prior_mismatch_rejected() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Change])
                .with_option(plan.family().limit_option(30).unwrap())
                .expecting_option(plan.family().limit_option(50).unwrap());
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(arranged.availability().code(), codes::PLAN_WAS_CHANGED);
        }

        #[test]
        fn expected_prior_match_passes() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Change])
                .with_option(plan.family().limit_option(30).unwrap())
                .expecting_option(plan.family().limit_option(20).unwrap());
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(arranged.availability().availability(), Availability::ReasonRequired);
        }

        #[test]
        fn unexpected_expiration_rejected() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY))
                .with_expected_active_until(ExpectedActiveUntil::Range {
                    value: NOW + 2 * DAY,
                    delta: 60,
                });
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(arranged.availability().code(), codes::UNEXPECTED_EXPIRATION_DATE);
        }

        #[test]
        fn expiration_bound_ignored_for_inactive_plan() {
            let plan = plan(NOW - DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong, ActionKind::Activate])
                .with_prolongation(Prolongation::Extend(DAY))
                .with_expected_active_until(ExpectedActiveUntil::Strict(NOW + 999));
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert!(arranged.availability().is_available());
        }

        #[test]
        fn activation_of_active_paid_plan_rejected() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong, ActionKind::Activate])
                .with_prolongation(Prolongation::Extend(DAY));
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(arranged.availability().code(), codes::PLAN_IS_ACTIVE);
        }

        #[test]
        fn require_available_trial_rejected_without_trial() {
            let plan = plan(NOW + DAY, 20);
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY))
                .with_trial_behaviour([TrialBehaviour::RequireAvailable]);
            let arranged = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(arranged.availability().code(), codes::TRIAL_UNAVAILABLE);
        }

        #[test]
        fn extra_condition_can_only_restrict() {
            let plan = plan(NOW + DAY, 20);
            let base = || {
                request()
                    .with_actions([ActionKind::Prolong])
                    .with_prolongation(Prolongation::Extend(DAY))
            };

            let relaxed = plan.arrange_alteration(
                base().with_extra_condition(|_| AvailabilityStatus::detached()),
                &Circumstance::new(5),
                NOW,
                Method::Payment,
            );
            assert_eq!(relaxed.availability().availability(), Availability::ReasonRequired);

            let blocked = plan.arrange_alteration(
                base().with_extra_condition(|plan: &TariffPlan| {
                    if plan.limit() == Some(20) {
                        AvailabilityStatus::new(Availability::UnavailableOutdated, 77, "blocked").unwrap()
                    } else {
                        AvailabilityStatus::detached()
                    }
                }),
                &Circumstance::new(5),
                NOW,
                Method::Payment,
            );
            assert_eq!(blocked.availability().code(), 77);
        }

        #[test]
        fn preview_does_not_mutate() {
            let plan = plan(NOW + DAY, 20);
            let before = plan.snapshot().clone();
            let request = request()
                .with_actions([ActionKind::Change])
                .with_option(plan.family().limit_option(30).unwrap());
            let _ = plan.arrange_alteration(request, &Circumstance::new(5), NOW, Method::Payment);
            assert_eq!(plan.snapshot(), &before);
            assert!(!plan.has_changes());
        }

        #[test]
        fn demo_option_is_kept_through_alterations() {
            let family = seats();
            let data = SnapshotData::new(2000, 2001, NOW + DAY, 0)
                .with_facet(FacetKey::Demo, DemoWindow::new(NOW + 5).export());
            let mut plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            let request = request()
                .with_actions([ActionKind::Prolong])
                .with_prolongation(Prolongation::Extend(DAY));
            assert!(plan
                .apply_alteration(Method::Payment, request, &Circumstance::new(5), NOW)
                .is_success());
            assert_eq!(plan.demo_active_until(), Some(NOW + 5));
        }

        #[test]
        fn extend_policy_family_reports_trial() {
            let catalog = TierCatalog::new(vec![10, 20], vec![10]).unwrap();
            let family = Arc::new(
                PlanFamily::new(
                    "members",
                    1000,
                    vec![FacetKey::ExtendPolicy, FacetKey::Limit],
                    Some(catalog),
                )
                .unwrap(),
            );
            let data = SnapshotData::new(1000, 1001, NOW + DAY, 0).with_facet(
                FacetKey::ExtendPolicy,
                ExtendPolicy::new(ExtendRule::Trial)
                    .with_trial_until(NOW + DAY)
                    .export(),
            );
            let plan = TariffPlan::from_snapshot_data(family, &data).unwrap();
            assert!(plan.is_trial(NOW));
            assert!(!plan.is_trial(NOW + DAY + 1));
            assert!(!plan.is_trial_available(NOW));
            assert_eq!(plan.extend_policy_rule(), Some(ExtendRule::Trial));
        }
    }
}

//! engine::alteration
//!
//! Declarative description of a desired plan change and its outcome.
//!
//! # Overview
//!
//! An [`AlterationRequest`] says what the caller wants: which actions apply,
//! how to prolong, which trial behaviours hold, which option values are
//! desired or expected. It also carries the availability the caller seeds
//! the evaluation with. The engine can only narrow that availability.
//!
//! # Seeding
//!
//! The seed is a constructor argument. It is set exactly once and there is
//! no setter, so a request can never be evaluated with a forgotten seed or
//! re-seeded halfway through. Seeding with
//! [`AvailabilityStatus::unappropriated_default`] makes every available
//! judgment lose to the seed.
//!
//! # Example
//!
//! ```
//! use tariffwork::core::availability::AvailabilityStatus;
//! use tariffwork::engine::alteration::{ActionKind, AlterationRequest, Prolongation};
//!
//! let request = AlterationRequest::new(AvailabilityStatus::detached())
//!     .with_actions([ActionKind::Prolong, ActionKind::Activate])
//!     .with_prolongation(Prolongation::Extend(30 * 86_400));
//!
//! assert!(request.is_activation());
//! assert!(request.is_prolongation_extend());
//! assert!(!request.is_change());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::options::PlanOption;
use super::plan::TariffPlan;
use crate::core::availability::AvailabilityStatus;
use crate::core::types::{FacetKey, Timestamp};

/// Kind of effect an alteration has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Changes option values without touching duration.
    Change,
    /// Prolongs the plan.
    Prolong,
    /// Activates the plan.
    Activate,
}

/// How the active-until date moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "value")]
pub enum Prolongation {
    /// Add seconds to `max(now, active_until)`.
    Extend(Timestamp),
    /// Set the exact active-until.
    Set(Timestamp),
    /// Make the plan infinite.
    Infinite,
    /// Leave dates alone.
    None,
}

/// Trial-related behaviour of an alteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialBehaviour {
    /// Free while a trial is running.
    FreeWhileActive,
    /// Free while a trial can still be started.
    FreeWhileAvailable,
    /// Only allowed while a trial can still be started.
    RequireAvailable,
}

/// Precondition on the plan's current active-until.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedActiveUntil {
    /// No check.
    None,
    /// Must match exactly.
    Strict(Timestamp),
    /// Must lie within `value ± delta`.
    Range { value: Timestamp, delta: Timestamp },
}

impl ExpectedActiveUntil {
    /// Whether a bound is declared.
    pub fn is_declared(&self) -> bool {
        !matches!(self, ExpectedActiveUntil::None)
    }

    /// Whether `active_until` satisfies the bound. Always true when undeclared.
    pub fn matches(&self, active_until: Timestamp) -> bool {
        match *self {
            ExpectedActiveUntil::None => true,
            ExpectedActiveUntil::Strict(value) => active_until == value,
            ExpectedActiveUntil::Range { value, delta } => {
                let delta = delta.saturating_abs();
                active_until >= value.saturating_sub(delta)
                    && active_until <= value.saturating_add(delta)
            }
        }
    }
}

/// Caller-supplied predicate evaluated after all built-in checks.
///
/// Its result is ratcheted into the request's availability, so it can only
/// restrict the outcome.
pub type ExtraCondition = Arc<dyn Fn(&TariffPlan) -> AvailabilityStatus + Send + Sync>;

/// A desired plan change.
#[derive(Clone)]
pub struct AlterationRequest {
    actions: BTreeSet<ActionKind>,
    prolongation: Prolongation,
    trial_behaviour: BTreeSet<TrialBehaviour>,
    expected_active_until: ExpectedActiveUntil,
    desired: BTreeMap<FacetKey, PlanOption>,
    expected_prior: BTreeMap<FacetKey, PlanOption>,
    availability: AvailabilityStatus,
    extra_conditions: Vec<ExtraCondition>,
}

impl AlterationRequest {
    /// Create a request seeded with the caller's initial availability.
    ///
    /// The default action set is `{Prolong}` with no prolongation rule.
    pub fn new(availability: AvailabilityStatus) -> Self {
        Self {
            actions: BTreeSet::from([ActionKind::Prolong]),
            prolongation: Prolongation::None,
            trial_behaviour: BTreeSet::new(),
            expected_active_until: ExpectedActiveUntil::None,
            desired: BTreeMap::new(),
            expected_prior: BTreeMap::new(),
            availability,
            extra_conditions: Vec::new(),
        }
    }

    /// Replace the action set.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = ActionKind>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Add one action.
    pub fn add_action(mut self, action: ActionKind) -> Self {
        self.actions.insert(action);
        self
    }

    /// Set the prolongation rule.
    pub fn with_prolongation(mut self, prolongation: Prolongation) -> Self {
        self.prolongation = prolongation;
        self
    }

    /// Replace the trial behaviour flags.
    pub fn with_trial_behaviour(
        mut self,
        behaviour: impl IntoIterator<Item = TrialBehaviour>,
    ) -> Self {
        self.trial_behaviour = behaviour.into_iter().collect();
        self
    }

    /// Declare a bound on the current active-until.
    pub fn with_expected_active_until(mut self, expected: ExpectedActiveUntil) -> Self {
        self.expected_active_until = expected;
        self
    }

    /// Request a specific option value. Replaces any earlier value for the facet.
    pub fn with_option(mut self, option: PlanOption) -> Self {
        self.desired.insert(option.key(), option);
        self
    }

    /// Require the current option to equal `option` before anything changes.
    pub fn expecting_option(mut self, option: PlanOption) -> Self {
        self.expected_prior.insert(option.key(), option);
        self
    }

    /// Append extra predicates. Order is preserved.
    pub fn with_extra_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&TariffPlan) -> AvailabilityStatus + Send + Sync + 'static,
    {
        self.extra_conditions.push(Arc::new(condition));
        self
    }

    /// Declared actions.
    pub fn actions(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.actions.iter().copied()
    }

    /// Prolongation rule.
    pub fn prolongation(&self) -> Prolongation {
        self.prolongation
    }

    /// Active-until precondition.
    pub fn expected_active_until(&self) -> ExpectedActiveUntil {
        self.expected_active_until
    }

    /// Desired option for a facet, if the caller supplied one.
    pub fn desired(&self, key: FacetKey) -> Option<&PlanOption> {
        self.desired.get(&key)
    }

    /// Expected-prior options.
    pub fn expected_prior(&self) -> impl Iterator<Item = &PlanOption> {
        self.expected_prior.values()
    }

    /// Current (possibly narrowed) availability.
    pub fn availability(&self) -> &AvailabilityStatus {
        &self.availability
    }

    /// Extra predicates in declaration order.
    pub fn extra_conditions(&self) -> &[ExtraCondition] {
        &self.extra_conditions
    }

    /// Ratchet a judgment into the availability.
    pub(crate) fn narrow(&mut self, candidate: &AvailabilityStatus) {
        let current = std::mem::replace(&mut self.availability, AvailabilityStatus::detached());
        self.availability = current.arrange(candidate);
    }

    /// Whether the request declares `Activate`.
    pub fn is_activation(&self) -> bool {
        self.actions.contains(&ActionKind::Activate)
    }

    /// Whether the request declares `Change`.
    pub fn is_change(&self) -> bool {
        self.actions.contains(&ActionKind::Change)
    }

    /// Whether the request declares `Prolong`.
    pub fn is_prolongation(&self) -> bool {
        self.actions.contains(&ActionKind::Prolong)
    }

    /// Prolong with the `Extend` rule.
    pub fn is_prolongation_extend(&self) -> bool {
        self.is_prolongation() && matches!(self.prolongation, Prolongation::Extend(_))
    }

    /// Prolong with the `Set` rule.
    pub fn is_prolongation_set(&self) -> bool {
        self.is_prolongation() && matches!(self.prolongation, Prolongation::Set(_))
    }

    /// Prolong with the `Infinite` rule.
    pub fn is_prolongation_infinite(&self) -> bool {
        self.is_prolongation() && self.prolongation == Prolongation::Infinite
    }

    /// Whether a trial behaviour flag is set.
    pub fn has_trial_behaviour(&self, behaviour: TrialBehaviour) -> bool {
        self.trial_behaviour.contains(&behaviour)
    }
}

impl std::fmt::Debug for AlterationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlterationRequest")
            .field("actions", &self.actions)
            .field("prolongation", &self.prolongation)
            .field("trial_behaviour", &self.trial_behaviour)
            .field("expected_active_until", &self.expected_active_until)
            .field("desired", &self.desired)
            .field("expected_prior", &self.expected_prior)
            .field("availability", &self.availability)
            .field("extra_conditions", &self.extra_conditions.len())
            .finish()
    }
}

/// Outcome of applying an alteration.
///
/// Rejections are expected business outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterationResult {
    /// The prospective snapshot was committed.
    Applied {
        /// Checks were skipped.
        forced: bool,
    },
    /// Nothing changed.
    Rejected { code: u32, message: String },
}

impl AlterationResult {
    /// Whether the alteration was committed.
    pub fn is_success(&self) -> bool {
        matches!(self, AlterationResult::Applied { .. })
    }

    /// Rejection code; zero on success.
    pub fn code(&self) -> u32 {
        match self {
            AlterationResult::Applied { .. } => 0,
            AlterationResult::Rejected { code, .. } => *code,
        }
    }

    /// Rejection message; empty on success.
    pub fn message(&self) -> &str {
        match self {
            AlterationResult::Applied { .. } => "",
            AlterationResult::Rejected { message, .. } => message,
        }
    }

    pub(crate) fn rejected(status: &AvailabilityStatus) -> Self {
        AlterationResult::Rejected {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::availability::Availability;

    mod request {
        use super::*;

        #[test]
        fn default_actions_are_prolong_only() {
            let request = AlterationRequest::new(AvailabilityStatus::detached());
            assert_eq!(request.actions().collect::<Vec<_>>(), vec![ActionKind::Prolong]);
            assert_eq!(request.prolongation(), Prolongation::None);
            assert!(!request.is_prolongation_extend());
        }

        #[test]
        fn add_action_deduplicates() {
            let request = AlterationRequest::new(AvailabilityStatus::detached())
                .add_action(ActionKind::Prolong)
                .add_action(ActionKind::Change);
            assert_eq!(
                request.actions().collect::<Vec<_>>(),
                vec![ActionKind::Change, ActionKind::Prolong]
            );
        }

        #[test]
        fn prolongation_rule_requires_prolong_action() {
            let request = AlterationRequest::new(AvailabilityStatus::detached())
                .with_actions([ActionKind::Change])
                .with_prolongation(Prolongation::Set(100));
            assert!(!request.is_prolongation_set());
        }

        #[test]
        fn narrow_only_restricts() {
            let mut request = AlterationRequest::new(AvailabilityStatus::free());
            request.narrow(&AvailabilityStatus::detached());
            assert_eq!(request.availability().availability(), Availability::Free);
            request.narrow(&AvailabilityStatus::unappropriated_default());
            assert!(!request.availability().is_available());
        }

        #[test]
        fn debug_hides_closures() {
            let request = AlterationRequest::new(AvailabilityStatus::detached())
                .with_extra_condition(|_| AvailabilityStatus::detached());
            assert!(format!("{request:?}").contains("extra_conditions: 1"));
        }
    }

    mod expected_active_until {
        use super::*;

        #[test]
        fn strict_requires_exact_match() {
            let rule = ExpectedActiveUntil::Strict(1000);
            assert!(rule.matches(1000));
            assert!(!rule.matches(1001));
        }

        #[test]
        fn range_is_inclusive() {
            let rule = ExpectedActiveUntil::Range {
                value: 1000,
                delta: 10,
            };
            assert!(rule.matches(990));
            assert!(rule.matches(1010));
            assert!(!rule.matches(989));
            assert!(!rule.matches(1011));
        }

        #[test]
        fn extreme_delta_saturates() {
            let rule = ExpectedActiveUntil::Range {
                value: 0,
                delta: i64::MIN,
            };
            assert!(rule.matches(5));
            assert!(rule.matches(i64::MIN + 1));
        }

        #[test]
        fn none_matches_everything() {
            assert!(!ExpectedActiveUntil::None.is_declared());
            assert!(ExpectedActiveUntil::None.matches(0));
        }
    }

    mod result {
        use super::*;

        #[test]
        fn applied_has_zero_code() {
            let result = AlterationResult::Applied { forced: false };
            assert!(result.is_success());
            assert_eq!(result.code(), 0);
            assert_eq!(result.message(), "");
        }

        #[test]
        fn rejected_copies_status() {
            let status = AvailabilityStatus::unappropriated_default();
            let result = AlterationResult::rejected(&status);
            assert!(!result.is_success());
            assert_eq!(result.code(), status.code());
            assert_eq!(result.message(), status.message());
        }
    }
}

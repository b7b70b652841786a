//! engine::options::extend_policy
//!
//! One-way auto-extension automaton with a trial deadline.
//!
//! # States
//!
//! ```text
//! Free --occupancy above threshold--> Trial --deadline passed--> Never
//!   \                                   \
//!    `------------- reason-funded ------'----------------------> Never
//! ```
//!
//! # Invariants
//!
//! - `Never` is terminal
//! - Nothing returns to `Free`
//! - `Trial` is only entered from `Free` (or kept from `Trial`)

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode_fields, Facet, FacetData, FacetError, PlanOption, Transition};
use crate::core::availability::{codes, Availability, AvailabilityStatus};
use crate::core::types::{FacetKey, Timestamp, INFINITE, UNBOUNDED};

/// Extend policy rule. Ordered by stickiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendRule {
    /// Trial not started yet.
    Free,
    /// Trial running until its deadline.
    Trial,
    /// No more free extension.
    Never,
}

impl ExtendRule {
    /// Storage name of the rule.
    pub fn as_str(self) -> &'static str {
        match self {
            ExtendRule::Free => "free",
            ExtendRule::Trial => "trial",
            ExtendRule::Never => "never",
        }
    }
}

impl FromStr for ExtendRule {
    type Err = FacetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(ExtendRule::Free),
            "trial" => Ok(ExtendRule::Trial),
            "never" => Ok(ExtendRule::Never),
            other => Err(FacetError::UnknownRule(other.to_string())),
        }
    }
}

impl std::fmt::Display for ExtendRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extend policy of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendPolicy {
    rule: ExtendRule,
    trial_until: Timestamp,
}

#[derive(Deserialize)]
struct RawExtendPolicy {
    rule: String,
    #[serde(default)]
    trial_till: Option<Timestamp>,
}

impl ExtendPolicy {
    /// Policy with an unbounded trial deadline.
    pub fn new(rule: ExtendRule) -> Self {
        Self {
            rule,
            trial_until: UNBOUNDED,
        }
    }

    /// Set the trial deadline.
    pub fn with_trial_until(mut self, trial_until: Timestamp) -> Self {
        self.trial_until = trial_until;
        self
    }

    pub(crate) fn decode(data: &FacetData) -> Result<Self, FacetError> {
        let raw: RawExtendPolicy = decode_fields(FacetKey::ExtendPolicy, data)?;
        let rule = raw.rule.parse()?;
        Ok(Self::new(rule).with_trial_until(raw.trial_till.unwrap_or(UNBOUNDED)))
    }

    pub fn rule(&self) -> ExtendRule {
        self.rule
    }

    /// Trial deadline; [`UNBOUNDED`] when none applies.
    pub fn trial_until(&self) -> Timestamp {
        self.trial_until
    }

    /// Whether a trial is running at `time`.
    pub fn is_trial(&self, time: Timestamp) -> bool {
        self.rule == ExtendRule::Trial && self.trial_until >= time
    }

    /// Whether a trial can still be started.
    pub fn is_trial_available(&self) -> bool {
        self.rule == ExtendRule::Free
    }

    fn not_allowed(message: &str) -> AvailabilityStatus {
        AvailabilityStatus::rejection(
            Availability::UnavailableUnappropriated,
            codes::EXTEND_POLICY_NOT_ALLOWED,
            message,
        )
    }
}

impl Facet for ExtendPolicy {
    const KEY: FacetKey = FacetKey::ExtendPolicy;

    fn project(option: &PlanOption) -> Option<&Self> {
        match option {
            PlanOption::ExtendPolicy(policy) => Some(policy),
            _ => None,
        }
    }

    /// Policies are the same when their rules are; the deadline is
    /// bookkeeping callers do not know.
    fn is_same(&self, other: &Self) -> bool {
        self.rule == other.rule
    }

    fn propose_replacement(&self, transition: &Transition<'_>) -> Self {
        if transition.action.has_reason() {
            return Self {
                rule: ExtendRule::Never,
                ..*self
            };
        }

        if self.rule == ExtendRule::Trial && self.trial_until < transition.action.time() {
            return Self {
                rule: ExtendRule::Never,
                ..*self
            };
        }

        let above_threshold = transition
            .family
            .trial_threshold()
            .is_some_and(|threshold| transition.circumstance.occupancy > threshold);

        if self.rule == ExtendRule::Free && above_threshold {
            let active_until = transition.prospective.active_until;
            let trial_until = if active_until == INFINITE {
                UNBOUNDED
            } else {
                active_until
            };
            return Self::new(ExtendRule::Trial).with_trial_until(trial_until);
        }

        *self
    }

    fn judge(&self, transition: &Transition<'_>) -> AvailabilityStatus {
        let Some(target) = Self::prospective(transition) else {
            return AvailabilityStatus::detached();
        };

        if self.rule == ExtendRule::Never && target.rule != ExtendRule::Never {
            return Self::not_allowed("never extend policy can not be changed");
        }

        if self.rule != ExtendRule::Free && target.rule == ExtendRule::Free {
            return Self::not_allowed("free extend policy is not available");
        }

        if target.rule == ExtendRule::Trial && self.rule > ExtendRule::Trial {
            return Self::not_allowed("trial is only available after free");
        }

        AvailabilityStatus::detached()
    }

    fn export(&self) -> FacetData {
        let mut data = FacetData::new();
        data.insert("rule".to_string(), Value::from(self.rule.as_str()));
        if self.trial_until != UNBOUNDED {
            data.insert("trial_till".to_string(), Value::from(self.trial_until));
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::{ActionContext, ActiveReason, Method, TrialState};
    use crate::engine::alteration::AlterationRequest;
    use crate::engine::circumstance::Circumstance;
    use crate::engine::family::PlanFamily;
    use crate::engine::snapshot::PlanSnapshot;

    const NOW: i64 = 1_000;

    fn family() -> PlanFamily {
        PlanFamily::new("flags", 3000, vec![FacetKey::ExtendPolicy], None)
            .unwrap()
            .with_trial_threshold(Some(10))
    }

    fn propose(policy: ExtendPolicy, method: Method, occupancy: u32, active_until: i64) -> ExtendPolicy {
        let family = family();
        let action = ActionContext::new(method, TrialState::None, [ActiveReason::NotExpired], NOW);
        let request = AlterationRequest::new(AvailabilityStatus::detached());
        let current = PlanSnapshot::new(NOW + 10, 0).with_option(policy);
        let prospective = PlanSnapshot::new(active_until, 0);
        let transition = Transition {
            family: &family,
            circumstance: &Circumstance::new(occupancy),
            action: &action,
            request: &request,
            current: &current,
            prospective: &prospective,
        };
        policy.propose_replacement(&transition)
    }

    fn judge(from: ExtendRule, to: ExtendRule) -> AvailabilityStatus {
        let family = family();
        let action = ActionContext::new(Method::Detached, TrialState::None, Vec::new(), NOW);
        let request = AlterationRequest::new(AvailabilityStatus::detached());
        let current = PlanSnapshot::new(NOW, 0).with_option(ExtendPolicy::new(from));
        let prospective = PlanSnapshot::new(NOW, 0).with_option(ExtendPolicy::new(to));
        let transition = Transition {
            family: &family,
            circumstance: &Circumstance::new(0),
            action: &action,
            request: &request,
            current: &current,
            prospective: &prospective,
        };
        ExtendPolicy::new(from).judge(&transition)
    }

    mod replacement {
        use super::*;

        #[test]
        fn reason_moves_to_never() {
            let next = propose(ExtendPolicy::new(ExtendRule::Free), Method::Promo, 0, NOW + 50);
            assert_eq!(next.rule(), ExtendRule::Never);
        }

        #[test]
        fn expired_trial_moves_to_never() {
            let trial = ExtendPolicy::new(ExtendRule::Trial).with_trial_until(NOW - 1);
            let next = propose(trial, Method::Detached, 0, NOW + 50);
            assert_eq!(next.rule(), ExtendRule::Never);
        }

        #[test]
        fn running_trial_is_kept() {
            let trial = ExtendPolicy::new(ExtendRule::Trial).with_trial_until(NOW);
            assert_eq!(propose(trial, Method::Detached, 50, NOW + 50), trial);
        }

        #[test]
        fn occupancy_above_threshold_starts_trial() {
            let next = propose(ExtendPolicy::new(ExtendRule::Free), Method::Detached, 11, NOW + 50);
            assert_eq!(next.rule(), ExtendRule::Trial);
            assert_eq!(next.trial_until(), NOW + 50);
        }

        #[test]
        fn infinite_plan_gets_unbounded_trial() {
            let next = propose(ExtendPolicy::new(ExtendRule::Free), Method::Detached, 11, INFINITE);
            assert_eq!(next.trial_until(), UNBOUNDED);
        }

        #[test]
        fn at_threshold_stays_free() {
            let next = propose(ExtendPolicy::new(ExtendRule::Free), Method::Detached, 10, NOW + 50);
            assert_eq!(next.rule(), ExtendRule::Free);
        }
    }

    mod judgment {
        use super::*;

        #[test]
        fn never_is_terminal() {
            assert!(!judge(ExtendRule::Never, ExtendRule::Trial).is_available());
            assert!(!judge(ExtendRule::Never, ExtendRule::Free).is_available());
            assert!(judge(ExtendRule::Never, ExtendRule::Never).is_available());
        }

        #[test]
        fn no_return_to_free() {
            let status = judge(ExtendRule::Trial, ExtendRule::Free);
            assert_eq!(status.code(), codes::EXTEND_POLICY_NOT_ALLOWED);
        }

        #[test]
        fn forward_moves_allowed() {
            for (from, to) in [
                (ExtendRule::Free, ExtendRule::Free),
                (ExtendRule::Free, ExtendRule::Trial),
                (ExtendRule::Free, ExtendRule::Never),
                (ExtendRule::Trial, ExtendRule::Trial),
                (ExtendRule::Trial, ExtendRule::Never),
            ] {
                assert_eq!(
                    judge(from, to).availability(),
                    Availability::Detached,
                    "{from} -> {to}"
                );
            }
        }
    }

    mod storage {
        use super::*;

        #[test]
        fn unbounded_deadline_not_exported() {
            let data = ExtendPolicy::new(ExtendRule::Free).export();
            assert_eq!(data.len(), 1);
            assert_eq!(data.get("rule"), Some(&Value::from("free")));
        }

        #[test]
        fn decode_reads_deadline() {
            let policy = ExtendPolicy::new(ExtendRule::Trial).with_trial_until(500);
            assert_eq!(ExtendPolicy::decode(&policy.export()).unwrap(), policy);
        }

        #[test]
        fn decode_rejects_unknown_rule() {
            let mut data = FacetData::new();
            data.insert("rule".to_string(), Value::from("sometimes"));
            assert!(matches!(
                ExtendPolicy::decode(&data),
                Err(FacetError::UnknownRule(rule)) if rule == "sometimes"
            ));
        }

        #[test]
        fn same_rule_is_same_regardless_of_deadline() {
            let recorded = ExtendPolicy::new(ExtendRule::Trial).with_trial_until(500);
            assert!(recorded.is_same(&ExtendPolicy::new(ExtendRule::Trial)));
            assert!(!recorded.is_same(&ExtendPolicy::new(ExtendRule::Never)));
            assert!(PlanOption::from(recorded).is_same(&ExtendPolicy::new(ExtendRule::Trial).into()));
        }

        #[test]
        fn trial_state_queries() {
            let trial = ExtendPolicy::new(ExtendRule::Trial).with_trial_until(100);
            assert!(trial.is_trial(100));
            assert!(!trial.is_trial(101));
            assert!(ExtendPolicy::new(ExtendRule::Free).is_trial_available());
            assert!(!trial.is_trial_available());
        }
    }
}

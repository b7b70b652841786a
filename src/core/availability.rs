//! core::availability
//!
//! Ranked availability of an alteration and its ratchet merge.
//!
//! # Ranks
//!
//! Ranks are totally ordered, lowest to highest precedence:
//!
//! ```text
//! Detached < ReasonRequired < WhileTrial < Free
//!          < UnavailableUnappropriated < UnavailableOutdated < UnavailableSame
//! ```
//!
//! The first four are available, the last three are not.
//!
//! # Invariants
//!
//! - Merging keeps the candidate only when its rank is strictly greater
//! - Within one evaluation a status can only move toward a higher rank
//! - Unavailable statuses always carry a non-zero code and a message;
//!   available statuses never do
//!
//! # Example
//!
//! ```
//! use tariffwork::core::availability::{Availability, AvailabilityStatus};
//!
//! let seed = AvailabilityStatus::detached();
//! let merged = seed
//!     .arrange(&AvailabilityStatus::free())
//!     .arrange(&AvailabilityStatus::reason_required());
//!
//! assert_eq!(merged.availability(), Availability::Free);
//! assert!(merged.is_available());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from constructing an availability status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("availability '{0}' requires a non-zero code and a message")]
    MissingCode(Availability),

    #[error("availability '{0}' must not carry an error code or message")]
    UnexpectedCode(Availability),
}

/// Rank of an alteration's availability.
///
/// Declaration order is the rank order; `Ord` is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Available at any moment.
    Detached,
    /// Needs a payment or promo reason.
    ReasonRequired,
    /// Available only while a trial applies.
    WhileTrial,
    /// Free regardless of reason.
    Free,
    /// Inputs do not match the plan state.
    UnavailableUnappropriated,
    /// Validity has expired.
    UnavailableOutdated,
    /// Requested values equal the current ones.
    UnavailableSame,
}

impl Availability {
    /// All ranks in precedence order.
    pub const ALL: [Availability; 7] = [
        Availability::Detached,
        Availability::ReasonRequired,
        Availability::WhileTrial,
        Availability::Free,
        Availability::UnavailableUnappropriated,
        Availability::UnavailableOutdated,
        Availability::UnavailableSame,
    ];

    /// Position in the precedence order.
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Whether the rank allows the alteration to proceed.
    pub fn is_available(self) -> bool {
        self < Availability::UnavailableUnappropriated
    }

    /// Storage name of the rank.
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Detached => "detached",
            Availability::ReasonRequired => "reason_required",
            Availability::WhileTrial => "while_trial",
            Availability::Free => "free",
            Availability::UnavailableUnappropriated => "unavailable_unappropriated",
            Availability::UnavailableOutdated => "unavailable_outdated",
            Availability::UnavailableSame => "unavailable_same",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Availability rank plus the error code and message of unavailable ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityStatus {
    availability: Availability,
    code: u32,
    message: String,
}

impl AvailabilityStatus {
    /// Create a status, checking the code/message pairing.
    ///
    /// # Errors
    ///
    /// - `MissingCode` if the rank is unavailable and the code is zero or the message empty
    /// - `UnexpectedCode` if the rank is available and a code or message is given
    ///
    /// # Example
    ///
    /// ```
    /// use tariffwork::core::availability::{Availability, AvailabilityStatus};
    ///
    /// assert!(AvailabilityStatus::new(Availability::Free, 0, "").is_ok());
    /// assert!(AvailabilityStatus::new(Availability::Free, 7, "nope").is_err());
    /// assert!(AvailabilityStatus::new(Availability::UnavailableSame, 0, "").is_err());
    /// ```
    pub fn new(
        availability: Availability,
        code: u32,
        message: impl Into<String>,
    ) -> Result<Self, AvailabilityError> {
        let message = message.into();

        if availability.is_available() {
            if code != 0 || !message.is_empty() {
                return Err(AvailabilityError::UnexpectedCode(availability));
            }
        } else if code == 0 || message.is_empty() {
            return Err(AvailabilityError::MissingCode(availability));
        }

        Ok(Self {
            availability,
            code,
            message,
        })
    }

    /// Unconditionally available.
    pub fn detached() -> Self {
        Self::available(Availability::Detached)
    }

    /// Available with a payment or promo reason.
    pub fn reason_required() -> Self {
        Self::available(Availability::ReasonRequired)
    }

    /// Available while a trial applies.
    pub fn while_trial() -> Self {
        Self::available(Availability::WhileTrial)
    }

    /// Available for free.
    pub fn free() -> Self {
        Self::available(Availability::Free)
    }

    /// Default seed used by callers that have not decided on an optimistic one.
    pub fn unappropriated_default() -> Self {
        Self::rejection(
            Availability::UnavailableUnappropriated,
            codes::NOT_ARRANGED,
            "alteration was not arranged",
        )
    }

    fn available(availability: Availability) -> Self {
        Self {
            availability,
            code: 0,
            message: String::new(),
        }
    }

    /// Engine-internal rejection. Codes are non-zero constants from [`codes`].
    pub(crate) fn rejection(availability: Availability, code: u32, message: &str) -> Self {
        debug_assert!(!availability.is_available() && code != 0 && !message.is_empty());
        Self {
            availability,
            code,
            message: message.to_string(),
        }
    }

    /// Merge one candidate, keeping it only if its rank is strictly greater.
    pub fn arrange(self, candidate: &AvailabilityStatus) -> Self {
        if candidate.availability > self.availability {
            candidate.clone()
        } else {
            self
        }
    }

    /// Merge several candidates left to right.
    pub fn arrange_all<'a, I>(self, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a AvailabilityStatus>,
    {
        candidates
            .into_iter()
            .fold(self, |acc, candidate| acc.arrange(candidate))
    }

    /// Get the rank.
    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Whether the alteration may proceed.
    pub fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    /// Whether the alteration needs a payment or promo reason.
    pub fn requires_reason(&self) -> bool {
        self.availability == Availability::ReasonRequired
    }

    /// Error code; zero for available statuses.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Error message; empty for available statuses.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Stable rejection codes.
///
/// Codes are grouped by the component that produces them.
pub mod codes {
    /// Seed status of a request that never went through arrangement.
    pub const NOT_ARRANGED: u32 = 1;
    /// A reason-requiring alteration was applied without payment or promo.
    pub const REASON_REQUIRED: u32 = 2;

    /// Expected-prior option did not match the current one.
    pub const PLAN_WAS_CHANGED: u32 = 100_10;
    /// Current active-until is outside the declared bound.
    pub const UNEXPECTED_EXPIRATION_DATE: u32 = 100_11;
    /// Expired plan must be activated before it can be extended.
    pub const ACTIVATION_REQUIRED: u32 = 100_12;
    /// Activation of a plan that is already active and paid.
    pub const PLAN_IS_ACTIVE: u32 = 100_13;
    /// Alteration requires an unused trial.
    pub const TRIAL_UNAVAILABLE: u32 = 100_14;

    /// Extend policy transition is not allowed.
    pub const EXTEND_POLICY_NOT_ALLOWED: u32 = 110_10;

    /// Limit does not fit the occupancy.
    pub const LIMIT_EXCEEDED: u32 = 120_10;
    /// Limit changed without the change action.
    pub const LIMIT_CHANGE_WITHOUT_CHANGE_ACTION: u32 = 120_30;
    /// Limit replacement is not supported in the current state.
    pub const LIMIT_UNSUPPORTED_REPLACEMENT: u32 = 120_90;
}

//! Guard decisions and their machine-readable reasoning.

use serde::{Deserialize, Serialize};

/// Why an evaluation was denied. The wire codes are stable: they appear
/// in audit records and HTTP error bodies, and callers branch on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Malformed identifiers; carries the violated field names. Raised
    /// before any collaborator call.
    InputValidationFailed { fields: Vec<String> },
    InsufficientPermissions,
    CompetitionNotFound,
    CompetitionInactive,
    ResultsDeadlinePassed,
    DuplicateResultPrevented,
    RateLimitExceeded { retry_after_secs: u64 },
    ResultNotFound,
    InsufficientAccess,
    OwnershipViolation,
    OrganizationBoundaryViolation,
    TimeLimitExceeded,
    VerifiedResultProtection,
    /// A collaborator failed mid-evaluation; the guard denies by
    /// default instead of failing open.
    InfrastructureFailure,
}

impl DenyReason {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InputValidationFailed { .. } => "input_validation_failed",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::CompetitionNotFound => "competition_not_found",
            Self::CompetitionInactive => "competition_inactive",
            Self::ResultsDeadlinePassed => "results_deadline_passed",
            Self::DuplicateResultPrevented => "duplicate_result_prevented",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::ResultNotFound => "result_not_found",
            Self::InsufficientAccess => "insufficient_access",
            Self::OwnershipViolation => "ownership_violation",
            Self::OrganizationBoundaryViolation => "organization_boundary_violation",
            Self::TimeLimitExceeded => "time_limit_exceeded",
            Self::VerifiedResultProtection => "verified_result_protection",
            Self::InfrastructureFailure => "infrastructure_failure",
        }
    }

    /// Human-facing companion to the code.
    pub fn message(&self) -> String {
        match self {
            Self::InputValidationFailed { fields } => {
                format!("Invalid identifiers: {}", fields.join(", "))
            }
            Self::InsufficientPermissions => {
                "Actor lacks the permissions required for this operation".to_string()
            }
            Self::CompetitionNotFound => "Competition does not exist".to_string(),
            Self::CompetitionInactive => "Competition is not currently active".to_string(),
            Self::ResultsDeadlinePassed => {
                "The results submission deadline for this competition has passed".to_string()
            }
            Self::DuplicateResultPrevented => {
                "A result for this competition is already recorded for the actor".to_string()
            }
            Self::RateLimitExceeded { retry_after_secs } => {
                format!("Creation rate limit exceeded, retry after {retry_after_secs} seconds")
            }
            Self::ResultNotFound => "Result does not exist".to_string(),
            Self::InsufficientAccess => {
                "Actor has no access path to this result".to_string()
            }
            Self::OwnershipViolation => {
                "Actor does not own this result and holds no delegated grant for it".to_string()
            }
            Self::OrganizationBoundaryViolation => {
                "Result belongs to a different organization".to_string()
            }
            Self::TimeLimitExceeded => {
                "The modification window for this result has closed".to_string()
            }
            Self::VerifiedResultProtection => {
                "Verified results are protected from modification".to_string()
            }
            Self::InfrastructureFailure => {
                "Authorization could not be completed and was denied by default".to_string()
            }
        }
    }
}

/// Qualifier attached to an allowed decision for downstream audit
/// enrichment and response shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    AdminCreated,
    AdminViewed,
    AdminModified,
    AdminDeleted,
    VerifiedEdit,
    OrganizationalEdit,
    OrganizationalDelete,
}

impl Restriction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminCreated => "admin_created",
            Self::AdminViewed => "admin_viewed",
            Self::AdminModified => "admin_modified",
            Self::AdminDeleted => "admin_deleted",
            Self::VerifiedEdit => "verified_edit",
            Self::OrganizationalEdit => "organizational_edit",
            Self::OrganizationalDelete => "organizational_delete",
        }
    }
}

/// Outcome of one guard evaluation.
///
/// Denials are normal control flow, not errors: every path through the
/// evaluator terminates in one of these, and callers trust `allowed`
/// completely rather than reinterpreting.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardDecision {
    pub allowed: bool,
    /// Machine-readable denial code; `None` on success.
    pub reason: Option<DenyReason>,
    /// Human-facing message; `None` on success.
    pub message: Option<String>,
    /// The caller must obtain an explicit confirmation step before
    /// executing the mutation, even though the permission check passed.
    pub requires_verification: bool,
    pub restrictions: Vec<Restriction>,
}

impl GuardDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            requires_verification: false,
            restrictions: Vec::new(),
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        let message = reason.message();
        Self {
            allowed: false,
            reason: Some(reason),
            message: Some(message),
            requires_verification: false,
            restrictions: Vec::new(),
        }
    }

    pub fn with_requires_verification(mut self, required: bool) -> Self {
        self.requires_verification = required;
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    /// Retry hint carried by rate-limit denials, in seconds.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.reason {
            Some(DenyReason::RateLimitExceeded { retry_after_secs }) => Some(retry_after_secs),
            _ => None,
        }
    }
}

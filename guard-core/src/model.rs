//! Domain records subject to access control.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::permission::{MembershipClass, Permission};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an authenticated actor.
    ActorId
);
uuid_id!(
    /// Identifier of a competition result record.
    ResultId
);
uuid_id!(
    /// Identifier of a competition.
    CompetitionId
);
uuid_id!(
    /// Identifier of an organization affiliation.
    OrgId
);

/// The authenticated caller. Constructed per-request from session state
/// and immutable for the duration of one guard evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub membership: MembershipClass,
    pub permissions: HashSet<Permission>,
    pub organization: Option<OrgId>,
}

impl Actor {
    pub fn new(id: ActorId, membership: MembershipClass) -> Self {
        Self {
            id,
            membership,
            permissions: HashSet::new(),
            organization: None,
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    pub fn with_organization(mut self, organization: OrgId) -> Self {
        self.organization = Some(organization);
        self
    }
}

/// A competition accepting result submissions while active and before
/// its results deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
    pub active: bool,
    pub results_deadline: Option<DateTime<Utc>>,
}

impl Competition {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.results_deadline.is_some_and(|deadline| now > deadline)
    }
}

/// A competition result record. Only `owner`, `organization`,
/// `verified`, `created_at` and `version` matter to authorization; the
/// remaining fields are domain payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionResult {
    pub id: ResultId,
    pub competition_id: CompetitionId,
    pub owner: ActorId,
    pub organization: Option<OrgId>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    /// Monotonic counter bumped on every mutation; conditional updates
    /// compare against it so the second of two racing writers loses.
    pub version: u64,
    pub category: String,
    pub placement: Option<u32>,
    pub score: Option<f64>,
    pub notes: Option<String>,
}

impl CompetitionResult {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn is_owned_by(&self, actor: ActorId) -> bool {
        self.owner == actor
    }

    /// Derived mutability of this result for a given owner-edit window.
    /// Not a persisted state: recomputed at every evaluation from the
    /// creation timestamp and the `verified` flag.
    pub fn mutability(&self, now: DateTime<Utc>, owner_window: Duration) -> MutabilityState {
        if self.verified {
            MutabilityState::VerifiedLocked
        } else if self.age(now) > owner_window {
            MutabilityState::OwnerLocked
        } else {
            MutabilityState::MutableByOwner
        }
    }
}

/// State machine view of a result's mutability.
///
/// `MutableByOwner` (within the window, unverified) degrades to
/// `OwnerLocked` once the window elapses; marking the result verified
/// moves it to `VerifiedLocked` regardless of age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutabilityState {
    MutableByOwner,
    OwnerLocked,
    VerifiedLocked,
}

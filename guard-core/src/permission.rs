//! Closed enumerations for granted permissions and membership classes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Permissions grantable to an actor.
///
/// A closed set: unknown wire names fail to parse instead of silently
/// never matching a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateResults,
    EditResults,
    EditOwnResults,
    EditVerifiedResults,
    DeleteResults,
    DeleteOwnResults,
    ManageOrganization,
    ViewResults,
    ViewOrganizationResults,
}

impl Permission {
    /// Stable wire name, as stored in session state and audit records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateResults => "create_results",
            Self::EditResults => "edit_results",
            Self::EditOwnResults => "edit_own_results",
            Self::EditVerifiedResults => "edit_verified_results",
            Self::DeleteResults => "delete_results",
            Self::DeleteOwnResults => "delete_own_results",
            Self::ManageOrganization => "manage_organization",
            Self::ViewResults => "view_results",
            Self::ViewOrganizationResults => "view_organization_results",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_results" => Ok(Self::CreateResults),
            "edit_results" => Ok(Self::EditResults),
            "edit_own_results" => Ok(Self::EditOwnResults),
            "edit_verified_results" => Ok(Self::EditVerifiedResults),
            "delete_results" => Ok(Self::DeleteResults),
            "delete_own_results" => Ok(Self::DeleteOwnResults),
            "manage_organization" => Ok(Self::ManageOrganization),
            "view_results" => Ok(Self::ViewResults),
            "view_organization_results" => Ok(Self::ViewOrganizationResults),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}

/// Membership class of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipClass {
    /// Universal override: passes every guard check.
    Admin,
    /// Organization account managing results for its affiliated actors.
    Organization,
    /// Regular registered competitor.
    Competitor,
    /// Registered account without a competition entry.
    Guest,
}

impl MembershipClass {
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Classes trusted to record results without a confirmation step.
    pub const fn self_verifying(self) -> bool {
        matches!(self, Self::Admin | Self::Organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        let all = [
            Permission::CreateResults,
            Permission::EditResults,
            Permission::EditOwnResults,
            Permission::EditVerifiedResults,
            Permission::DeleteResults,
            Permission::DeleteOwnResults,
            Permission::ManageOrganization,
            Permission::ViewResults,
            Permission::ViewOrganizationResults,
        ];
        for permission in all {
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(permission));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("edit_result".parse::<Permission>().is_err());
        assert!("".parse::<Permission>().is_err());
        assert!("EDIT_RESULTS".parse::<Permission>().is_err());
    }

    #[test]
    fn self_verifying_classes() {
        assert!(MembershipClass::Admin.self_verifying());
        assert!(MembershipClass::Organization.self_verifying());
        assert!(!MembershipClass::Competitor.self_verifying());
        assert!(!MembershipClass::Guest.self_verifying());
    }
}

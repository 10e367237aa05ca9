//! One-shot capability resolution.
//!
//! Membership class and granted permissions are folded into a single
//! [`Capabilities`] value when the permission context is built; every
//! guard operation consumes that value uniformly instead of re-deriving
//! admin status from the raw actor.

use std::collections::HashSet;

use crate::model::Actor;
use crate::permission::{MembershipClass, Permission};

#[derive(Debug, Clone)]
pub struct Capabilities {
    membership: MembershipClass,
    permissions: HashSet<Permission>,
}

impl Capabilities {
    pub fn resolve(actor: &Actor) -> Self {
        Self {
            membership: actor.membership,
            permissions: actor.permissions.clone(),
        }
    }

    pub fn membership(&self) -> MembershipClass {
        self.membership
    }

    /// Universal override: the administrative class passes every check.
    pub fn is_admin(&self) -> bool {
        self.membership.is_admin()
    }

    /// Classes trusted to record results without a confirmation step.
    pub fn self_verifying(&self) -> bool {
        self.membership.self_verifying()
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.permissions.contains(p))
    }

    /// Holds an edit grant reaching beyond the actor's own results.
    /// Such actors are exempt from the owner edit window.
    pub fn edits_any_result(&self) -> bool {
        self.has_any(&[Permission::EditResults, Permission::ManageOrganization])
    }

    /// Holds a delete grant reaching beyond the actor's own results.
    pub fn deletes_any_result(&self) -> bool {
        self.has_any(&[Permission::DeleteResults, Permission::ManageOrganization])
    }
}

//! Authorization checks for organisation administration.
//!
//! # Invariants
//! - Deny by default: an action is allowed only when a rule grants it.
//! - Discovery and search are public and never pass through this module.

use crate::model::org::Org;
use crate::model::user::{Role, User};

/// Organisation actions gated by authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgAction {
    AdminEdit,
    AdminUpdate,
}

impl OrgAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdminEdit => "admin_edit",
            Self::AdminUpdate => "admin_update",
        }
    }
}

/// Binary allow/deny decision for one `(user, action, org)` triple.
pub trait Authorizer {
    fn allows(&self, user: &User, action: OrgAction, org: &Org) -> bool;
}

/// Default role-based policy.
///
/// - Super admins administer every organisation.
/// - Org admins administer their own organisation only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgPolicy;

impl Authorizer for OrgPolicy {
    fn allows(&self, user: &User, action: OrgAction, org: &Org) -> bool {
        match (user.role, action) {
            (Role::SuperAdmin, _) => true,
            (Role::OrgAdmin, OrgAction::AdminEdit | OrgAction::AdminUpdate) => {
                user.org_id == Some(org.id)
            }
            (Role::User, _) => false,
        }
    }
}

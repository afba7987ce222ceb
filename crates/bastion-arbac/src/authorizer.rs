//! ARBAC02 delegated-administration predicates.
//!
//! Each predicate walks the admin session's authorized admin roles (active
//! admin roles plus the admin roles they inherit) and asks whether any one of
//! them covers the request. The first covering admin role wins.

use std::sync::Arc;

use bastion_directory::DirectoryStore;
use bastion_hierarchy::{HierarchyGraph, Snapshot};
use bastion_types::{
    AccessError, AdminRole, OrgUnitName, PermissionKey, Result, RoleName, Session, User, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::range::{RangeCache, in_pool};

// ============================================================================
// Decision
// ============================================================================

/// Administrative operation being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminOperation {
    Assign,
    Deassign,
    Grant,
    Revoke,
    AddUser,
    EditUser,
}

impl std::fmt::Display for AdminOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdminOperation::Assign => "assign",
            AdminOperation::Deassign => "deassign",
            AdminOperation::Grant => "grant",
            AdminOperation::Revoke => "revoke",
            AdminOperation::AddUser => "add-user",
            AdminOperation::EditUser => "edit-user",
        };
        f.write_str(name)
    }
}

/// Outcome of a delegated check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub operation: AdminOperation,
    pub allowed: bool,
    /// The admin role that covered the request, if any.
    pub admin_role: Option<RoleName>,
    /// Human-readable explanation of the outcome.
    pub reason: String,
}

impl Decision {
    fn allow(operation: AdminOperation, admin_role: &RoleName) -> Self {
        Self {
            operation,
            allowed: true,
            admin_role: Some(admin_role.clone()),
            reason: format!("covered by admin role {admin_role}"),
        }
    }

    fn deny(operation: AdminOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            allowed: false,
            admin_role: None,
            reason: reason.into(),
        }
    }

    /// Converts a denial into [`AccessError::Unauthorized`].
    pub fn require(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AccessError::Unauthorized(format!(
                "{}: {}",
                self.operation, self.reason
            )))
        }
    }
}

// ============================================================================
// Authorizer
// ============================================================================

/// Range and org-unit pool checks for delegated administration.
pub struct DelegatedAuthorizer {
    directory: Arc<dyn DirectoryStore>,
    roles: Arc<HierarchyGraph<RoleName>>,
    admin_roles: Arc<HierarchyGraph<RoleName>>,
    user_ous: Arc<HierarchyGraph<OrgUnitName>>,
    perm_ous: Arc<HierarchyGraph<OrgUnitName>>,
    enabled: bool,
    audit_enabled: bool,
}

impl std::fmt::Debug for DelegatedAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedAuthorizer")
            .field("enabled", &self.enabled)
            .field("audit_enabled", &self.audit_enabled)
            .finish_non_exhaustive()
    }
}

impl DelegatedAuthorizer {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        roles: Arc<HierarchyGraph<RoleName>>,
        admin_roles: Arc<HierarchyGraph<RoleName>>,
        user_ous: Arc<HierarchyGraph<OrgUnitName>>,
        perm_ous: Arc<HierarchyGraph<OrgUnitName>>,
    ) -> Self {
        Self {
            directory,
            roles,
            admin_roles,
            user_ous,
            perm_ous,
            enabled: true,
            audit_enabled: true,
        }
    }

    /// Turns every predicate into an [`AccessError::Unauthorized`] failure.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ------------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------------

    /// May the session assign `role` to `user`?
    pub fn can_assign(&self, session: &Session, user: &UserId, role: &RoleName) -> Result<bool> {
        Ok(self.decide_user_role(AdminOperation::Assign, session, user, role)?.allowed)
    }

    /// May the session remove `role` from `user`?
    pub fn can_deassign(&self, session: &Session, user: &UserId, role: &RoleName) -> Result<bool> {
        Ok(self.decide_user_role(AdminOperation::Deassign, session, user, role)?.allowed)
    }

    /// May the session grant `permission` to `role`?
    pub fn can_grant(
        &self,
        session: &Session,
        role: &RoleName,
        permission: &PermissionKey,
    ) -> Result<bool> {
        Ok(self.decide_permission(AdminOperation::Grant, session, role, permission)?.allowed)
    }

    /// May the session revoke `permission` from `role`?
    pub fn can_revoke(
        &self,
        session: &Session,
        role: &RoleName,
        permission: &PermissionKey,
    ) -> Result<bool> {
        Ok(self.decide_permission(AdminOperation::Revoke, session, role, permission)?.allowed)
    }

    /// May the session create `user`? Only the user's org unit is checked.
    pub fn can_add(&self, session: &Session, user: &User) -> Result<bool> {
        Ok(self.decide_user_ou(AdminOperation::AddUser, session, &user.ou)?.allowed)
    }

    /// May the session modify the stored `user`?
    pub fn can_edit(&self, session: &Session, user: &UserId) -> Result<bool> {
        let user = self.directory.load_user(user)?;
        Ok(self.decide_user_ou(AdminOperation::EditUser, session, &user.ou)?.allowed)
    }

    // ------------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------------

    /// Range check on `role` plus `os_u` pool check on the user's org unit.
    pub fn decide_user_role(
        &self,
        operation: AdminOperation,
        session: &Session,
        user: &UserId,
        role: &RoleName,
    ) -> Result<Decision> {
        self.ensure_enabled(operation)?;
        let target = self.directory.load_user(user)?;
        let roles = self.roles.snapshot();
        let ous = self.user_ous.snapshot();
        let mut ranges = RangeCache::default();

        let mut decision = Decision::deny(
            operation,
            format!("no active admin role covers role {role} for user {user} in {}", target.ou),
        );
        for admin in self.admin_roles_of(session)? {
            if covers(&mut ranges, &admin, role, &roles)
                && in_pool(&target.ou, &admin.os_u, &ous)
            {
                decision = Decision::allow(operation, &admin.name);
                break;
            }
        }

        self.audit(session, &decision, &format!("{user}/{role}"));
        Ok(decision)
    }

    /// Range check on `role` plus `os_p` pool check on the permission's org
    /// unit. A permission without an org unit is in no pool.
    pub fn decide_permission(
        &self,
        operation: AdminOperation,
        session: &Session,
        role: &RoleName,
        permission: &PermissionKey,
    ) -> Result<Decision> {
        self.ensure_enabled(operation)?;
        let stored = self.directory.load_permission(permission)?;
        let roles = self.roles.snapshot();
        let ous = self.perm_ous.snapshot();
        let mut ranges = RangeCache::default();

        let mut decision = Decision::deny(
            operation,
            format!("no active admin role covers role {role} for permission {permission}"),
        );
        if let Some(ou) = &stored.ou {
            for admin in self.admin_roles_of(session)? {
                if covers(&mut ranges, &admin, role, &roles)
                    && in_pool(ou, &admin.os_p, &ous)
                {
                    decision = Decision::allow(operation, &admin.name);
                    break;
                }
            }
        }

        self.audit(session, &decision, &format!("{role}/{permission}"));
        Ok(decision)
    }

    /// `os_u` pool check only.
    pub fn decide_user_ou(
        &self,
        operation: AdminOperation,
        session: &Session,
        ou: &OrgUnitName,
    ) -> Result<Decision> {
        self.ensure_enabled(operation)?;
        let ous = self.user_ous.snapshot();

        let decision = self
            .admin_roles_of(session)?
            .into_iter()
            .find(|admin| in_pool(ou, &admin.os_u, &ous))
            .map_or_else(
                || Decision::deny(operation, format!("org unit {ou} is outside every user pool")),
                |admin| Decision::allow(operation, &admin.name),
            );

        self.audit(session, &decision, ou.as_str());
        Ok(decision)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn ensure_enabled(&self, operation: AdminOperation) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(AccessError::Unauthorized(format!(
                "{operation}: delegated administration is disabled"
            )))
        }
    }

    /// Active admin roles and the admin roles they inherit, in name order.
    fn admin_roles_of(&self, session: &Session) -> Result<Vec<AdminRole>> {
        let closure = self
            .admin_roles
            .closure(session.activated_admin_roles.iter().map(|uar| &uar.role));
        closure
            .iter()
            .map(|name| self.directory.load_admin_role(name).map_err(AccessError::from))
            .collect()
    }

    fn audit(&self, session: &Session, decision: &Decision, target: &str) {
        if !self.audit_enabled {
            return;
        }
        if decision.allowed {
            info!(
                user = %session.user_id(),
                operation = %decision.operation,
                target = %target,
                admin_role = ?decision.admin_role,
                "Delegated operation allowed"
            );
        } else {
            warn!(
                user = %session.user_id(),
                operation = %decision.operation,
                target = %target,
                reason = %decision.reason,
                "Delegated operation denied"
            );
        }
    }
}

/// True if `role` lies in the admin role's range.
///
/// A range that no longer follows the role hierarchy (an edge or endpoint was
/// removed after the admin role was stored) covers nothing, and the caller
/// goes on to the session's other admin roles.
fn covers(
    ranges: &mut RangeCache,
    admin: &AdminRole,
    role: &RoleName,
    roles: &Snapshot<RoleName>,
) -> bool {
    match ranges.get(admin, roles) {
        Ok(range) => range.contains(role),
        Err(err) => {
            warn!(admin_role = %admin.name, "Admin role range skipped: {err}");
            false
        }
    }
}

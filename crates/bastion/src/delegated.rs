//! Administration on behalf of an admin session (ARBAC02).
//!
//! Each operation asks the [`DelegatedAuthorizer`](bastion_arbac::DelegatedAuthorizer)
//! whether one of the session's admin roles covers the target, then runs the
//! matching [`AdminManager`] operation. A denial fails with
//! [`AccessError::Unauthorized`] and changes nothing.

use std::sync::Arc;

use bastion_arbac::{AdminOperation, Decision};
use bastion_types::{PermissionKey, Result, RoleName, Session, User, UserId, UserRole};

use crate::admin::AdminManager;
use crate::bastion::BastionInner;

/// Range- and pool-checked administration.
#[derive(Clone)]
pub struct DelegatedManager {
    inner: Arc<BastionInner>,
    admin: AdminManager,
}

impl DelegatedManager {
    pub(crate) fn new(inner: Arc<BastionInner>) -> Self {
        let admin = AdminManager::new(inner.clone());
        Self { inner, admin }
    }

    // ------------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------------

    pub fn can_assign(&self, session: &Session, user: &UserId, role: &RoleName) -> Result<bool> {
        self.inner.authorizer.can_assign(session, user, role)
    }

    pub fn can_deassign(&self, session: &Session, user: &UserId, role: &RoleName) -> Result<bool> {
        self.inner.authorizer.can_deassign(session, user, role)
    }

    pub fn can_grant(
        &self,
        session: &Session,
        role: &RoleName,
        permission: &PermissionKey,
    ) -> Result<bool> {
        self.inner.authorizer.can_grant(session, role, permission)
    }

    pub fn can_revoke(
        &self,
        session: &Session,
        role: &RoleName,
        permission: &PermissionKey,
    ) -> Result<bool> {
        self.inner.authorizer.can_revoke(session, role, permission)
    }

    pub fn can_add(&self, session: &Session, user: &User) -> Result<bool> {
        self.inner.authorizer.can_add(session, user)
    }

    pub fn can_edit(&self, session: &Session, user: &UserId) -> Result<bool> {
        self.inner.authorizer.can_edit(session, user)
    }

    // ------------------------------------------------------------------------
    // Checked operations
    // ------------------------------------------------------------------------

    pub fn assign_user(&self, session: &mut Session, assignment: UserRole) -> Result<()> {
        self.prepare(session)?;
        self.inner
            .authorizer
            .decide_user_role(AdminOperation::Assign, session, &assignment.user_id, &assignment.role)
            .and_then(Decision::require)?;
        self.admin.assign_user(assignment)
    }

    pub fn deassign_user(
        &self,
        session: &mut Session,
        user: &UserId,
        role: &RoleName,
    ) -> Result<()> {
        self.prepare(session)?;
        self.inner
            .authorizer
            .decide_user_role(AdminOperation::Deassign, session, user, role)
            .and_then(Decision::require)?;
        self.admin.deassign_user(user, role)
    }

    pub fn grant_permission(
        &self,
        session: &mut Session,
        permission: &PermissionKey,
        role: &RoleName,
    ) -> Result<()> {
        self.prepare(session)?;
        self.inner
            .authorizer
            .decide_permission(AdminOperation::Grant, session, role, permission)
            .and_then(Decision::require)?;
        self.admin.grant_permission(permission, role)
    }

    pub fn revoke_permission(
        &self,
        session: &mut Session,
        permission: &PermissionKey,
        role: &RoleName,
    ) -> Result<()> {
        self.prepare(session)?;
        self.inner
            .authorizer
            .decide_permission(AdminOperation::Revoke, session, role, permission)
            .and_then(Decision::require)?;
        self.admin.revoke_permission(permission, role)
    }

    /// Adds a user whose org unit lies in one of the session's user pools.
    pub fn add_user(&self, session: &mut Session, user: User) -> Result<()> {
        self.prepare(session)?;
        self.inner
            .authorizer
            .decide_user_ou(AdminOperation::AddUser, session, &user.ou)
            .and_then(Decision::require)?;
        self.admin.add_user(user)
    }

    /// Updates a user. Moving the user to another org unit needs both the
    /// current and the new org unit to be in a user pool.
    pub fn update_user(&self, session: &mut Session, user: User) -> Result<()> {
        self.prepare(session)?;
        let stored = self.inner.directory.load_user(&user.user_id)?;
        self.inner
            .authorizer
            .decide_user_ou(AdminOperation::EditUser, session, &stored.ou)
            .and_then(Decision::require)?;
        if stored.ou != user.ou {
            self.inner
                .authorizer
                .decide_user_ou(AdminOperation::EditUser, session, &user.ou)
                .and_then(Decision::require)?;
        }
        self.admin.update_user(user)
    }

    pub fn delete_user(&self, session: &mut Session, user: &UserId) -> Result<()> {
        self.prepare(session)?;
        let stored = self.inner.directory.load_user(user)?;
        self.inner
            .authorizer
            .decide_user_ou(AdminOperation::EditUser, session, &stored.ou)
            .and_then(Decision::require)?;
        self.admin.delete_user(user)
    }

    /// Revalidates the admin session when the session policy asks for it.
    fn prepare(&self, session: &mut Session) -> Result<()> {
        if self.inner.sessions.policy().revalidate_on_access {
            self.inner.sessions.revalidate(session)?;
        }
        Ok(())
    }
}

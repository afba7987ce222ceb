//! Review queries: who holds what.

use std::collections::BTreeSet;
use std::sync::Arc;

use bastion_rbac::PermissionSet;
use bastion_types::{
    AccessError, AdminPermission, Permission, PermissionKey, Result, RoleName, SdKind, SdSet,
    UserAdminRole, UserId, UserRole,
};

use crate::bastion::BastionInner;

/// Read-only queries over assignments, grants and SD sets.
#[derive(Clone)]
pub struct ReviewManager {
    inner: Arc<BastionInner>,
}

impl ReviewManager {
    pub(crate) fn new(inner: Arc<BastionInner>) -> Self {
        Self { inner }
    }

    // ------------------------------------------------------------------------
    // Users and roles
    // ------------------------------------------------------------------------

    /// Users directly assigned `role`.
    pub fn assigned_users(&self, role: &RoleName) -> Result<Vec<UserId>> {
        self.inner.directory.load_role(role)?;
        Ok(self.inner.directory.assigned_users(role)?)
    }

    /// Users whose authorized roles include `role`: those assigned `role` or
    /// any role that inherits from it.
    pub fn authorized_users(&self, role: &RoleName) -> Result<BTreeSet<UserId>> {
        self.inner.directory.load_role(role)?;
        let mut holders = BTreeSet::new();
        for candidate in self.inner.roles.descendants(role).iter().chain([role]) {
            holders.extend(self.inner.directory.assigned_users(candidate)?);
        }
        Ok(holders)
    }

    pub fn assigned_roles(&self, user: &UserId) -> Result<Vec<UserRole>> {
        Ok(self.inner.directory.load_user(user)?.roles)
    }

    /// Assigned roles plus every role they inherit.
    pub fn authorized_roles(&self, user: &UserId) -> Result<BTreeSet<RoleName>> {
        let user = self.inner.directory.load_user(user)?;
        Ok(self.inner.roles.closure(user.role_names()))
    }

    pub fn assigned_admin_users(&self, role: &RoleName) -> Result<Vec<UserId>> {
        self.inner.directory.load_admin_role(role)?;
        Ok(self.inner.directory.assigned_admin_users(role)?)
    }

    pub fn assigned_admin_roles(&self, user: &UserId) -> Result<Vec<UserAdminRole>> {
        Ok(self.inner.directory.load_user(user)?.admin_roles)
    }

    // ------------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------------

    /// Permissions granted directly to `role`; inherited grants are not
    /// included.
    pub fn role_permissions(&self, role: &RoleName) -> Result<Vec<Permission>> {
        self.inner.directory.load_role(role)?;
        Ok(self.inner.directory.role_permissions(role)?)
    }

    /// Every permission the user would hold with all assigned roles active.
    pub fn user_permissions(&self, user: &UserId) -> Result<PermissionSet> {
        let roles = self.authorized_roles(user)?;
        let found = self.inner.directory.find_permissions(&roles, user)?;
        Ok(PermissionSet::new(found))
    }

    /// Roles named in the permission's grant list.
    pub fn permission_roles(&self, permission: &PermissionKey) -> Result<BTreeSet<RoleName>> {
        Ok(self.inner.directory.load_permission(permission)?.roles)
    }

    /// Users granted the permission directly.
    pub fn permission_users(&self, permission: &PermissionKey) -> Result<BTreeSet<UserId>> {
        Ok(self.inner.directory.load_permission(permission)?.users)
    }

    pub fn admin_role_permissions(&self, role: &RoleName) -> Result<Vec<AdminPermission>> {
        self.inner.directory.load_admin_role(role)?;
        Ok(self.inner.directory.admin_role_permissions(role)?)
    }

    // ------------------------------------------------------------------------
    // SD sets
    // ------------------------------------------------------------------------

    pub fn sd_set(&self, name: &str) -> Result<SdSet> {
        self.inner
            .sd_sets
            .get(name)
            .ok_or_else(|| AccessError::not_found("SD set", name))
    }

    /// Sets of `kind` that name `role` as a member.
    pub fn sd_sets_with(&self, kind: SdKind, role: &RoleName) -> Vec<SdSet> {
        self.inner
            .sd_sets
            .snapshot()
            .of_kind(kind)
            .filter(|set| set.contains(role))
            .cloned()
            .collect()
    }
}

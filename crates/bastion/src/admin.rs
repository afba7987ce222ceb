//! Security-officer administration.
//!
//! Every change is validated against the live hierarchies and SD sets,
//! persisted to the directory, and only then published. Writes are
//! serialized through one writer lock, so an SSD check on `assign_user`
//! and an SSD tightening on `set_sd_cardinality` cannot interleave.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

use bastion_arbac::authorized_range;
use bastion_directory::DirectoryError;
use bastion_hierarchy::{HierarchyGraph, NodeName};
use bastion_rbac::separation;
use bastion_types::{
    AccessError, AdminPermission, AdminRole, OrgUnit, OrgUnitKind, OrgUnitName, Permission,
    PermissionKey, Result, Role, RoleName, SdKind, SdSet, User, UserAdminRole, UserId, UserRole,
};
use tracing::info;

use crate::bastion::BastionInner;

/// Which permission catalog a grant edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Catalog {
    Rbac,
    Admin,
}

/// Distinguishes "absent" from a failing directory.
fn exists<T>(found: bastion_directory::Result<T>) -> Result<bool> {
    match found {
        Ok(_) => Ok(true),
        Err(DirectoryError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Administrative operations with no delegated checks.
///
/// Use [`DelegatedManager`](crate::DelegatedManager) to run the same
/// operations on behalf of an admin session.
#[derive(Clone)]
pub struct AdminManager {
    inner: Arc<BastionInner>,
}

impl AdminManager {
    pub(crate) fn new(inner: Arc<BastionInner>) -> Self {
        Self { inner }
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Adds a user. Assignments on `user` are ignored; use
    /// [`assign_user`](Self::assign_user) so SSD sets are enforced.
    pub fn add_user(&self, mut user: User) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        if user.user_id.as_str().trim().is_empty() {
            return Err(AccessError::ValidationFailed("user id is empty".into()));
        }
        if exists(directory.load_user(&user.user_id))? {
            return Err(AccessError::already_exists("user", &user.user_id));
        }
        directory.load_org_unit(OrgUnitKind::User, &user.ou)?;

        user.roles.clear();
        user.admin_roles.clear();
        let user_id = user.user_id.clone();
        directory.store_user(user)?;
        self.audit("add user", &user_id);
        Ok(())
    }

    /// Replaces a user's org unit and constraint. Assignments are untouched.
    pub fn update_user(&self, user: User) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        directory.load_user(&user.user_id)?;
        directory.load_org_unit(OrgUnitKind::User, &user.ou)?;

        let user_id = user.user_id.clone();
        directory.store_user(user)?;
        self.audit("update user", &user_id);
        Ok(())
    }

    /// Deletes a user along with its assignments and direct grants.
    pub fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        directory.load_user(user_id)?;

        let none = BTreeSet::new();
        for mut permission in directory.find_permissions(&none, user_id)? {
            if permission.users.remove(user_id) {
                directory.store_permission(permission)?;
            }
        }
        for mut permission in directory.find_admin_permissions(&none, user_id)? {
            if permission.users.remove(user_id) {
                directory.store_admin_permission(permission)?;
            }
        }
        directory.remove_user(user_id)?;
        self.audit("delete user", user_id);
        Ok(())
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    /// Assigns a role, enforcing every SSD set the role belongs to.
    pub fn assign_user(&self, assignment: UserRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let user = directory.load_user(&assignment.user_id)?;
        directory.load_role(&assignment.role)?;
        if user.assigned_role(&assignment.role).is_some() {
            return Err(AccessError::already_exists(
                "user role",
                format!("{}/{}", user.user_id, assignment.role),
            ));
        }

        let assigned: Vec<RoleName> = user.role_names().cloned().collect();
        let sets = self.inner.sd_sets.snapshot();
        separation::check_assignment(
            &user.user_id,
            &assignment.role,
            &assigned,
            sets.of_kind(SdKind::Ssd),
        )?;

        let target = format!("{}/{}", assignment.user_id, assignment.role);
        directory.store_user_role(assignment)?;
        self.audit("assign user", target);
        Ok(())
    }

    pub fn deassign_user(&self, user_id: &UserId, role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let user = directory.load_user(user_id)?;
        if user.assigned_role(role).is_none() {
            return Err(AccessError::NotAssigned {
                user: user_id.clone(),
                role: role.clone(),
            });
        }
        directory.remove_user_role(user_id, role)?;
        self.audit("deassign user", format_args!("{user_id}/{role}"));
        Ok(())
    }

    pub fn assign_admin_user(&self, assignment: UserAdminRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let user = directory.load_user(&assignment.user_id)?;
        directory.load_admin_role(&assignment.role)?;
        if user.assigned_admin_role(&assignment.role).is_some() {
            return Err(AccessError::already_exists(
                "user admin role",
                format!("{}/{}", user.user_id, assignment.role),
            ));
        }

        let target = format!("{}/{}", assignment.user_id, assignment.role);
        directory.store_user_admin_role(assignment)?;
        self.audit("assign admin user", target);
        Ok(())
    }

    pub fn deassign_admin_user(&self, user_id: &UserId, role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let user = directory.load_user(user_id)?;
        if user.assigned_admin_role(role).is_none() {
            return Err(AccessError::NotAssigned {
                user: user_id.clone(),
                role: role.clone(),
            });
        }
        directory.remove_user_admin_role(user_id, role)?;
        self.audit("deassign admin user", format_args!("{user_id}/{role}"));
        Ok(())
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub fn add_role(&self, role: Role) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.create_role(role)
    }

    /// Replaces a role's description and constraint.
    pub fn update_role(&self, role: Role) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(&role.name)?;
        let name = role.name.clone();
        self.inner.directory.store_role(role)?;
        self.audit("update role", &name);
        Ok(())
    }

    /// Deletes a detached role.
    ///
    /// Fails with [`AccessError::NodeInUse`] while the role still has
    /// parents or children, and with [`AccessError::ValidationFailed`] while
    /// an SD set names it. Assignments and grants of the role are removed.
    pub fn delete_role(&self, name: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(name)?;
        self.ensure_not_in_sd_set(name)?;
        self.inner.roles.remove_node(name)?;
        self.purge_role(name)
    }

    /// Deletes a role, linking each of its parents to each of its children
    /// so inheritance through it is preserved.
    pub fn delete_role_relinking(&self, name: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(name)?;
        self.ensure_not_in_sd_set(name)?;
        self.detach_relinking(&*self.inner.roles, name)?;
        self.purge_role(name)
    }

    /// Makes `child` inherit `parent`'s permissions.
    pub fn add_inheritance(&self, parent: &RoleName, child: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(parent)?;
        self.inner.directory.load_role(child)?;
        self.link(&*self.inner.roles, parent, child)
    }

    pub fn delete_inheritance(&self, parent: &RoleName, child: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.unlink(&*self.inner.roles, parent, child)
    }

    /// Creates `child` as a new role inheriting from `parent`.
    pub fn add_descendant(&self, parent: &RoleName, child: Role) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(parent)?;
        let name = child.name.clone();
        self.create_role(child)?;
        self.link_or_undo(&*self.inner.roles, parent, &name, || {
            self.inner.directory.remove_role(&name)
        })
    }

    /// Creates `parent` as a new role that `child` inherits from.
    pub fn add_ascendant(&self, child: &RoleName, parent: Role) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(child)?;
        let name = parent.name.clone();
        self.create_role(parent)?;
        self.link_or_undo(&*self.inner.roles, &name, child, || {
            self.inner.directory.remove_role(&name)
        })
    }

    // ========================================================================
    // Admin roles
    // ========================================================================

    /// Adds an admin role after checking its range follows the role
    /// hierarchy and its pools name existing org units.
    pub fn add_admin_role(&self, role: AdminRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.create_admin_role(role)
    }

    pub fn update_admin_role(&self, role: AdminRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_admin_role(&role.name)?;
        self.validate_admin_role(&role)?;
        let name = role.name.clone();
        self.inner.directory.store_admin_role(role)?;
        self.audit("update admin role", &name);
        Ok(())
    }

    /// Deletes a detached admin role with its assignments and grants.
    pub fn delete_admin_role(&self, name: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        directory.load_admin_role(name)?;
        self.inner.admin_roles.remove_node(name)?;

        for user_id in directory.assigned_admin_users(name)? {
            directory.remove_user_admin_role(&user_id, name)?;
        }
        for mut permission in directory.admin_role_permissions(name)? {
            permission.roles.remove(name);
            directory.store_admin_permission(permission)?;
        }
        directory.remove_admin_role(name)?;
        self.audit("delete admin role", name);
        Ok(())
    }

    pub fn add_admin_inheritance(&self, parent: &RoleName, child: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_admin_role(parent)?;
        self.inner.directory.load_admin_role(child)?;
        self.link(&*self.inner.admin_roles, parent, child)
    }

    pub fn delete_admin_inheritance(&self, parent: &RoleName, child: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.unlink(&*self.inner.admin_roles, parent, child)
    }

    pub fn add_admin_descendant(&self, parent: &RoleName, child: AdminRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_admin_role(parent)?;
        let name = child.name.clone();
        self.create_admin_role(child)?;
        self.link_or_undo(&*self.inner.admin_roles, parent, &name, || {
            self.inner.directory.remove_admin_role(&name)
        })
    }

    pub fn add_admin_ascendant(&self, child: &RoleName, parent: AdminRole) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_admin_role(child)?;
        let name = parent.name.clone();
        self.create_admin_role(parent)?;
        self.link_or_undo(&*self.inner.admin_roles, &name, child, || {
            self.inner.directory.remove_admin_role(&name)
        })
    }

    // ========================================================================
    // Org units
    // ========================================================================

    pub fn add_org_unit(&self, ou: OrgUnit) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        if exists(directory.load_org_unit(ou.kind, &ou.name))? {
            return Err(AccessError::already_exists("org unit", &ou.name));
        }
        let name = ou.name.clone();
        directory.store_org_unit(ou)?;
        self.audit("add org unit", &name);
        Ok(())
    }

    /// Deletes a detached org unit.
    pub fn delete_org_unit(&self, kind: OrgUnitKind, name: &OrgUnitName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_org_unit(kind, name)?;
        self.inner.ou_graph(kind).remove_node(name)?;
        self.inner.directory.remove_org_unit(kind, name)?;
        self.audit("delete org unit", name);
        Ok(())
    }

    /// Places `child` inside `parent`, so pools naming `parent` cover it.
    pub fn add_ou_inheritance(
        &self,
        kind: OrgUnitKind,
        parent: &OrgUnitName,
        child: &OrgUnitName,
    ) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_org_unit(kind, parent)?;
        self.inner.directory.load_org_unit(kind, child)?;
        self.link(self.inner.ou_graph(kind), parent, child)
    }

    pub fn delete_ou_inheritance(
        &self,
        kind: OrgUnitKind,
        parent: &OrgUnitName,
        child: &OrgUnitName,
    ) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.unlink(self.inner.ou_graph(kind), parent, child)
    }

    // ========================================================================
    // SD sets
    // ========================================================================

    /// Creates an SSD or DSD set.
    ///
    /// An SSD set is refused with [`AccessError::ValidationFailed`] if an
    /// existing user already holds `cardinality` of its members.
    pub fn create_sd_set(&self, set: SdSet) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        if self.inner.sd_sets.get(&set.name).is_some() || exists(directory.load_sd_set(&set.name))? {
            return Err(AccessError::already_exists("SD set", &set.name));
        }
        for member in &set.members {
            directory.load_role(member)?;
        }
        let name = set.name.clone();
        self.inner.sd_sets.upsert_with(set, |set| self.persist_sd_set(set))?;
        self.audit("create SD set", name);
        Ok(())
    }

    pub fn delete_sd_set(&self, name: &str) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.sd_sets.remove_with(name, || {
            self.inner
                .directory
                .remove_sd_set(name)
                .map_err(AccessError::from)
        })?;
        self.audit("delete SD set", name);
        Ok(())
    }

    pub fn add_sd_member(&self, name: &str, role: &RoleName) -> Result<SdSet> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(role)?;
        let current = self
            .inner
            .sd_sets
            .get(name)
            .ok_or_else(|| AccessError::not_found("SD set", name))?;
        if current.contains(role) {
            return Err(AccessError::already_exists("SD member", format!("{name}/{role}")));
        }

        let set = self.inner.sd_sets.modify_with(
            name,
            |set| {
                set.members.insert(role.clone());
            },
            |set| self.persist_sd_set(set),
        )?;
        self.audit("add SD member", format_args!("{name}/{role}"));
        Ok(set)
    }

    /// Removes a member. Fails with [`AccessError::ValidationFailed`] if the
    /// set would end up with fewer members than its cardinality.
    pub fn remove_sd_member(&self, name: &str, role: &RoleName) -> Result<SdSet> {
        let _writer = self.inner.lock_writer()?;
        let current = self
            .inner
            .sd_sets
            .get(name)
            .ok_or_else(|| AccessError::not_found("SD set", name))?;
        if !current.contains(role) {
            return Err(AccessError::not_found("SD member", format!("{name}/{role}")));
        }

        let set = self.inner.sd_sets.modify_with(
            name,
            |set| {
                set.members.remove(role);
            },
            |set| self.persist_sd_set(set),
        )?;
        self.audit("remove SD member", format_args!("{name}/{role}"));
        Ok(set)
    }

    pub fn set_sd_cardinality(&self, name: &str, cardinality: usize) -> Result<SdSet> {
        let _writer = self.inner.lock_writer()?;
        let set = self.inner.sd_sets.modify_with(
            name,
            |set| set.cardinality = cardinality,
            |set| self.persist_sd_set(set),
        )?;
        self.audit("set SD cardinality", format_args!("{name}={cardinality}"));
        Ok(set)
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Adds a permission. Any grants it carries must name existing roles and
    /// users.
    pub fn add_permission(&self, permission: Permission) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let key = permission.key();
        if exists(directory.load_permission(&key))? {
            return Err(AccessError::already_exists("permission", &key));
        }
        self.validate_permission(&permission, Catalog::Rbac)?;
        directory.store_permission(permission)?;
        self.audit("add permission", &key);
        Ok(())
    }

    pub fn delete_permission(&self, key: &PermissionKey) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.remove_permission(key)?;
        self.audit("delete permission", key);
        Ok(())
    }

    pub fn grant_permission(&self, key: &PermissionKey, role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_role(role)?;
        self.edit_grants(Catalog::Rbac, key, |permission| {
            if permission.roles.insert(role.clone()) {
                Ok(())
            } else {
                Err(AccessError::already_exists("grant", format!("{key} to {role}")))
            }
        })?;
        self.audit("grant permission", format_args!("{key} to {role}"));
        Ok(())
    }

    pub fn revoke_permission(&self, key: &PermissionKey, role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.edit_grants(Catalog::Rbac, key, |permission| {
            if permission.roles.remove(role) {
                Ok(())
            } else {
                Err(AccessError::not_found("grant", format!("{key} to {role}")))
            }
        })?;
        self.audit("revoke permission", format_args!("{key} from {role}"));
        Ok(())
    }

    pub fn grant_user_permission(&self, key: &PermissionKey, user_id: &UserId) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_user(user_id)?;
        self.edit_grants(Catalog::Rbac, key, |permission| {
            if permission.users.insert(user_id.clone()) {
                Ok(())
            } else {
                Err(AccessError::already_exists("grant", format!("{key} to {user_id}")))
            }
        })?;
        self.audit("grant user permission", format_args!("{key} to {user_id}"));
        Ok(())
    }

    pub fn revoke_user_permission(&self, key: &PermissionKey, user_id: &UserId) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.edit_grants(Catalog::Rbac, key, |permission| {
            if permission.users.remove(user_id) {
                Ok(())
            } else {
                Err(AccessError::not_found("grant", format!("{key} to {user_id}")))
            }
        })?;
        self.audit("revoke user permission", format_args!("{key} from {user_id}"));
        Ok(())
    }

    /// Adds a permission over administrative objects. Role grants name
    /// admin roles.
    pub fn add_admin_permission(&self, permission: AdminPermission) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        let directory = &self.inner.directory;
        let key = permission.key();
        if exists(directory.load_admin_permission(&key))? {
            return Err(AccessError::already_exists("admin permission", &key));
        }
        self.validate_permission(&permission, Catalog::Admin)?;
        directory.store_admin_permission(permission)?;
        self.audit("add admin permission", &key);
        Ok(())
    }

    pub fn delete_admin_permission(&self, key: &PermissionKey) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.remove_admin_permission(key)?;
        self.audit("delete admin permission", key);
        Ok(())
    }

    pub fn grant_admin_permission(&self, key: &PermissionKey, admin_role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.inner.directory.load_admin_role(admin_role)?;
        self.edit_grants(Catalog::Admin, key, |permission| {
            if permission.roles.insert(admin_role.clone()) {
                Ok(())
            } else {
                Err(AccessError::already_exists("grant", format!("{key} to {admin_role}")))
            }
        })?;
        self.audit("grant admin permission", format_args!("{key} to {admin_role}"));
        Ok(())
    }

    pub fn revoke_admin_permission(&self, key: &PermissionKey, admin_role: &RoleName) -> Result<()> {
        let _writer = self.inner.lock_writer()?;
        self.edit_grants(Catalog::Admin, key, |permission| {
            if permission.roles.remove(admin_role) {
                Ok(())
            } else {
                Err(AccessError::not_found("grant", format!("{key} to {admin_role}")))
            }
        })?;
        self.audit("revoke admin permission", format_args!("{key} from {admin_role}"));
        Ok(())
    }

    // ========================================================================
    // Helpers (callers hold the writer lock)
    // ========================================================================

    fn create_role(&self, role: Role) -> Result<()> {
        let directory = &self.inner.directory;
        if exists(directory.load_role(&role.name))? {
            return Err(AccessError::already_exists("role", &role.name));
        }
        let name = role.name.clone();
        directory.store_role(role)?;
        self.audit("add role", &name);
        Ok(())
    }

    fn create_admin_role(&self, role: AdminRole) -> Result<()> {
        let directory = &self.inner.directory;
        if exists(directory.load_admin_role(&role.name))? {
            return Err(AccessError::already_exists("admin role", &role.name));
        }
        self.validate_admin_role(&role)?;
        let name = role.name.clone();
        directory.store_admin_role(role)?;
        self.audit("add admin role", &name);
        Ok(())
    }

    fn validate_admin_role(&self, role: &AdminRole) -> Result<()> {
        let directory = &self.inner.directory;
        match (&role.begin_range, &role.end_range) {
            (Some(begin), Some(end)) => {
                directory.load_role(begin)?;
                directory.load_role(end)?;
                authorized_range(role, &self.inner.roles.snapshot())?;
            }
            (None, None) => {}
            _ => {
                return Err(AccessError::ValidationFailed(format!(
                    "admin role {} sets only one range endpoint",
                    role.name
                )));
            }
        }
        for ou in &role.os_u {
            directory.load_org_unit(OrgUnitKind::User, ou)?;
        }
        for ou in &role.os_p {
            directory.load_org_unit(OrgUnitKind::Perm, ou)?;
        }
        Ok(())
    }

    fn validate_permission(&self, permission: &Permission, catalog: Catalog) -> Result<()> {
        let directory = &self.inner.directory;
        if let Some(ou) = &permission.ou {
            directory.load_org_unit(OrgUnitKind::Perm, ou)?;
        }
        for role in &permission.roles {
            match catalog {
                Catalog::Rbac => directory.load_role(role).map(drop)?,
                Catalog::Admin => directory.load_admin_role(role).map(drop)?,
            }
        }
        for user_id in &permission.users {
            directory.load_user(user_id)?;
        }
        Ok(())
    }

    fn edit_grants<F>(&self, catalog: Catalog, key: &PermissionKey, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Permission) -> Result<()>,
    {
        let directory = &self.inner.directory;
        let mut permission = match catalog {
            Catalog::Rbac => directory.load_permission(key)?,
            Catalog::Admin => directory.load_admin_permission(key)?,
        };
        edit(&mut permission)?;
        match catalog {
            Catalog::Rbac => directory.store_permission(permission)?,
            Catalog::Admin => directory.store_admin_permission(permission)?,
        }
        Ok(())
    }

    fn ensure_not_in_sd_set(&self, role: &RoleName) -> Result<()> {
        let sets = self.inner.sd_sets.snapshot();
        let member_of = sets
            .of_kind(SdKind::Ssd)
            .chain(sets.of_kind(SdKind::Dsd))
            .find(|set| set.contains(role));
        match member_of {
            Some(set) => Err(AccessError::ValidationFailed(format!(
                "role {role} is a member of {} set {}",
                set.kind, set.name
            ))),
            None => Ok(()),
        }
    }

    /// Drops assignments and grants of a detached role, then the role.
    fn purge_role(&self, name: &RoleName) -> Result<()> {
        let directory = &self.inner.directory;
        for user_id in directory.assigned_users(name)? {
            directory.remove_user_role(&user_id, name)?;
        }
        for mut permission in directory.role_permissions(name)? {
            permission.roles.remove(name);
            directory.store_permission(permission)?;
        }
        directory.remove_role(name)?;
        self.audit("delete role", name);
        Ok(())
    }

    /// Runs the SSD guard and persists `set`; called under the catalog lock.
    fn persist_sd_set(&self, set: &SdSet) -> Result<()> {
        let directory = &self.inner.directory;
        if set.kind == SdKind::Ssd {
            let mut holders = BTreeSet::new();
            for member in &set.members {
                holders.extend(directory.assigned_users(member)?);
            }
            let users = holders
                .iter()
                .map(|user_id| directory.load_user(user_id))
                .collect::<bastion_directory::Result<Vec<User>>>()?;
            separation::check_existing_assignments(set, &users)?;
        }
        directory.store_sd_set(set.clone())?;
        Ok(())
    }

    fn link<N: NodeName>(&self, graph: &HierarchyGraph<N>, parent: &N, child: &N) -> Result<()> {
        let kind = graph.kind();
        graph.add_edge_with(parent, child, || {
            self.inner
                .directory
                .store_hierarchy_edge(kind, &parent.to_string(), &child.to_string())
                .map_err(AccessError::from)
        })?;
        self.audit("add inheritance", format_args!("{kind} {parent} -> {child}"));
        Ok(())
    }

    /// Links a freshly created node, deleting it again if the edge is refused.
    fn link_or_undo<N, U>(
        &self,
        graph: &HierarchyGraph<N>,
        parent: &N,
        child: &N,
        undo: U,
    ) -> Result<()>
    where
        N: NodeName,
        U: FnOnce() -> bastion_directory::Result<()>,
    {
        if let Err(err) = self.link(graph, parent, child) {
            undo()?;
            return Err(err);
        }
        Ok(())
    }

    fn unlink<N: NodeName>(&self, graph: &HierarchyGraph<N>, parent: &N, child: &N) -> Result<()> {
        let kind = graph.kind();
        graph.remove_edge_with(parent, child, || {
            self.inner
                .directory
                .remove_hierarchy_edge(kind, &parent.to_string(), &child.to_string())
                .map_err(AccessError::from)
        })?;
        self.audit("delete inheritance", format_args!("{kind} {parent} -> {child}"));
        Ok(())
    }

    fn detach_relinking<N: NodeName>(&self, graph: &HierarchyGraph<N>, node: &N) -> Result<()> {
        let kind = graph.kind();
        let directory = &self.inner.directory;
        graph.remove_node_relinking_with(node, |removed, added| {
            for (parent, child) in removed {
                directory.remove_hierarchy_edge(kind, &parent.to_string(), &child.to_string())?;
            }
            for (parent, child) in added {
                directory.store_hierarchy_edge(kind, &parent.to_string(), &child.to_string())?;
            }
            Ok(())
        })
    }

    fn audit(&self, operation: &str, target: impl Display) {
        if self.inner.audit_enabled() {
            info!(operation, target = %target, "Administrative change applied");
        }
    }
}

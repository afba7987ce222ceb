//! The directory store interface.

use std::collections::BTreeSet;

use bastion_types::{
    AdminPermission, AdminRole, GraphKind, OrgUnit, OrgUnitKind, OrgUnitName, Permission,
    PermissionKey, Role, RoleName, SdKind, SdSet, User, UserAdminRole, UserId, UserRole,
};

use crate::error::Result;

/// CRUD and search over directory entities.
///
/// Implementations must be safe to call from many threads. Failures are
/// surfaced as [`DirectoryError`](crate::DirectoryError) and never retried
/// by the engines.
pub trait DirectoryStore: Send + Sync {
    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Loads a user together with its role and admin-role assignments.
    fn load_user(&self, user_id: &UserId) -> Result<User>;

    fn load_role(&self, name: &RoleName) -> Result<Role>;

    fn load_admin_role(&self, name: &RoleName) -> Result<AdminRole>;

    fn load_org_unit(&self, kind: OrgUnitKind, name: &OrgUnitName) -> Result<OrgUnit>;

    fn load_sd_set(&self, name: &str) -> Result<SdSet>;

    fn load_sd_sets(&self, kind: SdKind) -> Result<Vec<SdSet>>;

    /// Edges of one hierarchy as `(parent, child)` names.
    fn load_hierarchy_edges(&self, kind: GraphKind) -> Result<Vec<(String, String)>>;

    fn load_permission(&self, key: &PermissionKey) -> Result<Permission>;

    fn load_admin_permission(&self, key: &PermissionKey) -> Result<AdminPermission>;

    /// Permissions granted to any of `roles` or directly to `user`.
    fn find_permissions(&self, roles: &BTreeSet<RoleName>, user: &UserId) -> Result<Vec<Permission>>;

    /// Admin permissions granted to any of `admin_roles` or directly to `user`.
    fn find_admin_permissions(
        &self,
        admin_roles: &BTreeSet<RoleName>,
        user: &UserId,
    ) -> Result<Vec<AdminPermission>>;

    /// Permissions whose grant list names `role`.
    fn role_permissions(&self, role: &RoleName) -> Result<Vec<Permission>>;

    /// Admin permissions whose grant list names the admin role `role`.
    fn admin_role_permissions(&self, role: &RoleName) -> Result<Vec<AdminPermission>>;

    /// Users holding a direct assignment of `role`.
    fn assigned_users(&self, role: &RoleName) -> Result<Vec<UserId>>;

    /// Users holding a direct assignment of the admin role `role`.
    fn assigned_admin_users(&self, role: &RoleName) -> Result<Vec<UserId>>;

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Inserts a user, or updates the OU and constraint of an existing one.
    /// Assignments on an existing record are only changed through
    /// [`store_user_role`](Self::store_user_role) and friends.
    fn store_user(&self, user: User) -> Result<()>;

    fn remove_user(&self, user_id: &UserId) -> Result<()>;

    fn store_role(&self, role: Role) -> Result<()>;

    fn remove_role(&self, name: &RoleName) -> Result<()>;

    fn store_admin_role(&self, role: AdminRole) -> Result<()>;

    fn remove_admin_role(&self, name: &RoleName) -> Result<()>;

    fn store_org_unit(&self, ou: OrgUnit) -> Result<()>;

    fn remove_org_unit(&self, kind: OrgUnitKind, name: &OrgUnitName) -> Result<()>;

    /// Adds or replaces the assignment for `(user_id, role)`.
    fn store_user_role(&self, assignment: UserRole) -> Result<()>;

    fn remove_user_role(&self, user_id: &UserId, role: &RoleName) -> Result<()>;

    fn store_user_admin_role(&self, assignment: UserAdminRole) -> Result<()>;

    fn remove_user_admin_role(&self, user_id: &UserId, role: &RoleName) -> Result<()>;

    fn store_sd_set(&self, set: SdSet) -> Result<()>;

    fn remove_sd_set(&self, name: &str) -> Result<()>;

    fn store_hierarchy_edge(&self, kind: GraphKind, parent: &str, child: &str) -> Result<()>;

    fn remove_hierarchy_edge(&self, kind: GraphKind, parent: &str, child: &str) -> Result<()>;

    fn store_permission(&self, permission: Permission) -> Result<()>;

    fn remove_permission(&self, key: &PermissionKey) -> Result<()>;

    fn store_admin_permission(&self, permission: AdminPermission) -> Result<()>;

    fn remove_admin_permission(&self, key: &PermissionKey) -> Result<()>;
}

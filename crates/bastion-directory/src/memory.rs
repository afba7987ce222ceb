//! In-memory [`DirectoryStore`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bastion_types::{
    AdminPermission, AdminRole, GraphKind, OrgUnit, OrgUnitKind, OrgUnitName, Permission,
    PermissionKey, Role, RoleName, SdKind, SdSet, User, UserAdminRole, UserId, UserRole,
};
use tracing::{debug, info};

use crate::error::{DirectoryError, Result};
use crate::journal::{ChangeJournal, DirectoryChange};
use crate::store::DirectoryStore;

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleName, Role>,
    admin_roles: BTreeMap<RoleName, AdminRole>,
    user_ous: BTreeMap<OrgUnitName, OrgUnit>,
    perm_ous: BTreeMap<OrgUnitName, OrgUnit>,
    sd_sets: BTreeMap<String, SdSet>,
    edges: BTreeMap<GraphKind, BTreeSet<(String, String)>>,
    permissions: BTreeMap<PermissionKey, Permission>,
    admin_permissions: BTreeMap<PermissionKey, AdminPermission>,
}

impl State {
    fn user_mut(&mut self, user_id: &UserId) -> Result<&mut User> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::not_found("user", user_id))
    }

    fn ous_mut(&mut self, kind: OrgUnitKind) -> &mut BTreeMap<OrgUnitName, OrgUnit> {
        match kind {
            OrgUnitKind::User => &mut self.user_ous,
            OrgUnitKind::Perm => &mut self.perm_ous,
        }
    }

    /// The stored edge matching `parent -> child`. Role names compare without
    /// case, org unit names exactly.
    fn find_edge(&self, kind: GraphKind, parent: &str, child: &str) -> Result<(String, String)> {
        let fold = matches!(kind, GraphKind::Role | GraphKind::AdminRole);
        let same = |a: &str, b: &str| {
            if fold {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        self.edges
            .get(&kind)
            .and_then(|edges| edges.iter().find(|(p, c)| same(p, parent) && same(c, child)))
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("hierarchy edge", format!("{parent} -> {child}")))
    }

    /// Fails with the error [`Self::apply`] would return, without changing
    /// anything.
    fn check(&self, change: &DirectoryChange) -> Result<()> {
        match change {
            DirectoryChange::StoreUser(_)
            | DirectoryChange::StoreRole(_)
            | DirectoryChange::StoreAdminRole(_)
            | DirectoryChange::StoreOrgUnit(_)
            | DirectoryChange::StoreSdSet(_)
            | DirectoryChange::StoreEdge { .. }
            | DirectoryChange::StorePermission(_)
            | DirectoryChange::StoreAdminPermission(_) => Ok(()),
            DirectoryChange::RemoveUser(user_id) => {
                missing(self.users.contains_key(user_id), "user", user_id)
            }
            DirectoryChange::RemoveRole(name) => {
                missing(self.roles.contains_key(name), "role", name)
            }
            DirectoryChange::RemoveAdminRole(name) => {
                missing(self.admin_roles.contains_key(name), "admin role", name)
            }
            DirectoryChange::RemoveOrgUnit(kind, name) => {
                let ous = match kind {
                    OrgUnitKind::User => &self.user_ous,
                    OrgUnitKind::Perm => &self.perm_ous,
                };
                missing(ous.contains_key(name), "org unit", name)
            }
            DirectoryChange::StoreUserRole(UserRole { user_id, .. })
            | DirectoryChange::StoreUserAdminRole(UserAdminRole { user_id, .. }) => {
                missing(self.users.contains_key(user_id), "user", user_id)
            }
            DirectoryChange::RemoveUserRole(user_id, role) => {
                let user = self.load_user(user_id)?;
                let held = user.roles.iter().any(|ur| &ur.role == role);
                missing(held, "user role", format!("{user_id}/{role}"))
            }
            DirectoryChange::RemoveUserAdminRole(user_id, role) => {
                let user = self.load_user(user_id)?;
                let held = user.admin_roles.iter().any(|uar| &uar.role == role);
                missing(held, "user admin role", format!("{user_id}/{role}"))
            }
            DirectoryChange::RemoveSdSet(name) => {
                missing(self.sd_sets.contains_key(name), "SD set", name)
            }
            DirectoryChange::RemoveEdge {
                kind,
                parent,
                child,
            } => self.find_edge(*kind, parent, child).map(drop),
            DirectoryChange::RemovePermission(key) => {
                missing(self.permissions.contains_key(key), "permission", key)
            }
            DirectoryChange::RemoveAdminPermission(key) => {
                missing(self.admin_permissions.contains_key(key), "admin permission", key)
            }
        }
    }

    fn load_user(&self, user_id: &UserId) -> Result<&User> {
        self.users
            .get(user_id)
            .ok_or_else(|| DirectoryError::not_found("user", user_id))
    }

    /// Applies one change, failing without side effects if it cannot apply.
    fn apply(&mut self, change: DirectoryChange) -> Result<()> {
        match change {
            DirectoryChange::StoreUser(user) => match self.users.get_mut(&user.user_id) {
                Some(existing) => {
                    existing.ou = user.ou;
                    existing.constraint = user.constraint;
                }
                None => {
                    self.users.insert(user.user_id.clone(), user);
                }
            },
            DirectoryChange::RemoveUser(user_id) => {
                self.users
                    .remove(&user_id)
                    .ok_or_else(|| DirectoryError::not_found("user", &user_id))?;
            }
            DirectoryChange::StoreRole(role) => {
                self.roles.insert(role.name.clone(), role);
            }
            DirectoryChange::RemoveRole(name) => {
                self.roles
                    .remove(&name)
                    .ok_or_else(|| DirectoryError::not_found("role", &name))?;
            }
            DirectoryChange::StoreAdminRole(role) => {
                self.admin_roles.insert(role.name.clone(), role);
            }
            DirectoryChange::RemoveAdminRole(name) => {
                self.admin_roles
                    .remove(&name)
                    .ok_or_else(|| DirectoryError::not_found("admin role", &name))?;
            }
            DirectoryChange::StoreOrgUnit(ou) => {
                self.ous_mut(ou.kind).insert(ou.name.clone(), ou);
            }
            DirectoryChange::RemoveOrgUnit(kind, name) => {
                self.ous_mut(kind)
                    .remove(&name)
                    .ok_or_else(|| DirectoryError::not_found("org unit", &name))?;
            }
            DirectoryChange::StoreUserRole(assignment) => {
                let user = self.user_mut(&assignment.user_id)?;
                match user.roles.iter_mut().find(|ur| ur.role == assignment.role) {
                    Some(existing) => *existing = assignment,
                    None => user.roles.push(assignment),
                }
            }
            DirectoryChange::RemoveUserRole(user_id, role) => {
                let user = self.user_mut(&user_id)?;
                let before = user.roles.len();
                user.roles.retain(|ur| ur.role != role);
                if user.roles.len() == before {
                    return Err(DirectoryError::not_found(
                        "user role",
                        format!("{user_id}/{role}"),
                    ));
                }
            }
            DirectoryChange::StoreUserAdminRole(assignment) => {
                let user = self.user_mut(&assignment.user_id)?;
                match user
                    .admin_roles
                    .iter_mut()
                    .find(|uar| uar.role == assignment.role)
                {
                    Some(existing) => *existing = assignment,
                    None => user.admin_roles.push(assignment),
                }
            }
            DirectoryChange::RemoveUserAdminRole(user_id, role) => {
                let user = self.user_mut(&user_id)?;
                let before = user.admin_roles.len();
                user.admin_roles.retain(|uar| uar.role != role);
                if user.admin_roles.len() == before {
                    return Err(DirectoryError::not_found(
                        "user admin role",
                        format!("{user_id}/{role}"),
                    ));
                }
            }
            DirectoryChange::StoreSdSet(set) => {
                self.sd_sets.insert(set.name.clone(), set);
            }
            DirectoryChange::RemoveSdSet(name) => {
                self.sd_sets
                    .remove(&name)
                    .ok_or_else(|| DirectoryError::not_found("SD set", &name))?;
            }
            DirectoryChange::StoreEdge {
                kind,
                parent,
                child,
            } => {
                self.edges.entry(kind).or_default().insert((parent, child));
            }
            DirectoryChange::RemoveEdge {
                kind,
                parent,
                child,
            } => {
                let edge = self.find_edge(kind, &parent, &child)?;
                if let Some(edges) = self.edges.get_mut(&kind) {
                    edges.remove(&edge);
                }
            }
            DirectoryChange::StorePermission(permission) => {
                self.permissions.insert(permission.key(), permission);
            }
            DirectoryChange::RemovePermission(key) => {
                self.permissions
                    .remove(&key)
                    .ok_or_else(|| DirectoryError::not_found("permission", &key))?;
            }
            DirectoryChange::StoreAdminPermission(permission) => {
                self.admin_permissions.insert(permission.key(), permission);
            }
            DirectoryChange::RemoveAdminPermission(key) => {
                self.admin_permissions
                    .remove(&key)
                    .ok_or_else(|| DirectoryError::not_found("admin permission", &key))?;
            }
        }
        Ok(())
    }
}

fn missing(present: bool, entity: &'static str, name: impl Display) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(DirectoryError::not_found(entity, name))
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    journal: Option<ChangeJournal>,
}

/// A directory held in memory.
///
/// Writes are checked against the current state, journaled when a journal is
/// attached, and only then applied in place.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: RwLock<Inner>,
}

impl MemoryDirectory {
    /// Creates an empty, volatile directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a journaled directory, replaying any existing journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let journal = ChangeJournal::open(path)?;
        let mut state = State::default();
        let entries = journal.replay()?;
        let replayed = entries.len();
        for entry in entries {
            state.apply(entry.change)?;
        }
        info!(
            path = %journal.path().display(),
            replayed,
            "directory journal replayed"
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                state,
                journal: Some(journal),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, change: DirectoryChange) -> Result<()> {
        let mut inner = self.write();
        inner.state.check(&change)?;
        if let Some(journal) = inner.journal.as_mut() {
            let seq = journal.append(&change)?;
            debug!(seq, "directory change journaled");
        }
        inner.state.apply(change)
    }

    /// Number of users, for diagnostics and tests.
    pub fn user_count(&self) -> usize {
        self.read().state.users.len()
    }
}

impl DirectoryStore for MemoryDirectory {
    fn load_user(&self, user_id: &UserId) -> Result<User> {
        self.read()
            .state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("user", user_id))
    }

    fn load_role(&self, name: &RoleName) -> Result<Role> {
        self.read()
            .state
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("role", name))
    }

    fn load_admin_role(&self, name: &RoleName) -> Result<AdminRole> {
        self.read()
            .state
            .admin_roles
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("admin role", name))
    }

    fn load_org_unit(&self, kind: OrgUnitKind, name: &OrgUnitName) -> Result<OrgUnit> {
        let inner = self.read();
        let ous = match kind {
            OrgUnitKind::User => &inner.state.user_ous,
            OrgUnitKind::Perm => &inner.state.perm_ous,
        };
        ous.get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("org unit", name))
    }

    fn load_sd_set(&self, name: &str) -> Result<SdSet> {
        self.read()
            .state
            .sd_sets
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("SD set", name))
    }

    fn load_sd_sets(&self, kind: SdKind) -> Result<Vec<SdSet>> {
        Ok(self
            .read()
            .state
            .sd_sets
            .values()
            .filter(|set| set.kind == kind)
            .cloned()
            .collect())
    }

    fn load_hierarchy_edges(&self, kind: GraphKind) -> Result<Vec<(String, String)>> {
        Ok(self
            .read()
            .state
            .edges
            .get(&kind)
            .map(|edges| edges.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn load_permission(&self, key: &PermissionKey) -> Result<Permission> {
        self.read()
            .state
            .permissions
            .get(key)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("permission", key))
    }

    fn load_admin_permission(&self, key: &PermissionKey) -> Result<AdminPermission> {
        self.read()
            .state
            .admin_permissions
            .get(key)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("admin permission", key))
    }

    fn find_permissions(&self, roles: &BTreeSet<RoleName>, user: &UserId) -> Result<Vec<Permission>> {
        Ok(self
            .read()
            .state
            .permissions
            .values()
            .filter(|p| p.users.contains(user) || p.roles.iter().any(|r| roles.contains(r)))
            .cloned()
            .collect())
    }

    fn find_admin_permissions(
        &self,
        admin_roles: &BTreeSet<RoleName>,
        user: &UserId,
    ) -> Result<Vec<AdminPermission>> {
        Ok(self
            .read()
            .state
            .admin_permissions
            .values()
            .filter(|p| p.users.contains(user) || p.roles.iter().any(|r| admin_roles.contains(r)))
            .cloned()
            .collect())
    }

    fn role_permissions(&self, role: &RoleName) -> Result<Vec<Permission>> {
        Ok(self
            .read()
            .state
            .permissions
            .values()
            .filter(|p| p.roles.contains(role))
            .cloned()
            .collect())
    }

    fn admin_role_permissions(&self, role: &RoleName) -> Result<Vec<AdminPermission>> {
        Ok(self
            .read()
            .state
            .admin_permissions
            .values()
            .filter(|p| p.roles.contains(role))
            .cloned()
            .collect())
    }

    fn assigned_users(&self, role: &RoleName) -> Result<Vec<UserId>> {
        Ok(self
            .read()
            .state
            .users
            .values()
            .filter(|user| user.assigned_role(role).is_some())
            .map(|user| user.user_id.clone())
            .collect())
    }

    fn assigned_admin_users(&self, role: &RoleName) -> Result<Vec<UserId>> {
        Ok(self
            .read()
            .state
            .users
            .values()
            .filter(|user| user.assigned_admin_role(role).is_some())
            .map(|user| user.user_id.clone())
            .collect())
    }

    fn store_user(&self, user: User) -> Result<()> {
        self.commit(DirectoryChange::StoreUser(user))
    }

    fn remove_user(&self, user_id: &UserId) -> Result<()> {
        self.commit(DirectoryChange::RemoveUser(user_id.clone()))
    }

    fn store_role(&self, role: Role) -> Result<()> {
        self.commit(DirectoryChange::StoreRole(role))
    }

    fn remove_role(&self, name: &RoleName) -> Result<()> {
        self.commit(DirectoryChange::RemoveRole(name.clone()))
    }

    fn store_admin_role(&self, role: AdminRole) -> Result<()> {
        self.commit(DirectoryChange::StoreAdminRole(role))
    }

    fn remove_admin_role(&self, name: &RoleName) -> Result<()> {
        self.commit(DirectoryChange::RemoveAdminRole(name.clone()))
    }

    fn store_org_unit(&self, ou: OrgUnit) -> Result<()> {
        self.commit(DirectoryChange::StoreOrgUnit(ou))
    }

    fn remove_org_unit(&self, kind: OrgUnitKind, name: &OrgUnitName) -> Result<()> {
        self.commit(DirectoryChange::RemoveOrgUnit(kind, name.clone()))
    }

    fn store_user_role(&self, assignment: UserRole) -> Result<()> {
        self.commit(DirectoryChange::StoreUserRole(assignment))
    }

    fn remove_user_role(&self, user_id: &UserId, role: &RoleName) -> Result<()> {
        self.commit(DirectoryChange::RemoveUserRole(user_id.clone(), role.clone()))
    }

    fn store_user_admin_role(&self, assignment: UserAdminRole) -> Result<()> {
        self.commit(DirectoryChange::StoreUserAdminRole(assignment))
    }

    fn remove_user_admin_role(&self, user_id: &UserId, role: &RoleName) -> Result<()> {
        self.commit(DirectoryChange::RemoveUserAdminRole(
            user_id.clone(),
            role.clone(),
        ))
    }

    fn store_sd_set(&self, set: SdSet) -> Result<()> {
        self.commit(DirectoryChange::StoreSdSet(set))
    }

    fn remove_sd_set(&self, name: &str) -> Result<()> {
        self.commit(DirectoryChange::RemoveSdSet(name.to_string()))
    }

    fn store_hierarchy_edge(&self, kind: GraphKind, parent: &str, child: &str) -> Result<()> {
        self.commit(DirectoryChange::StoreEdge {
            kind,
            parent: parent.to_string(),
            child: child.to_string(),
        })
    }

    fn remove_hierarchy_edge(&self, kind: GraphKind, parent: &str, child: &str) -> Result<()> {
        self.commit(DirectoryChange::RemoveEdge {
            kind,
            parent: parent.to_string(),
            child: child.to_string(),
        })
    }

    fn store_permission(&self, permission: Permission) -> Result<()> {
        self.commit(DirectoryChange::StorePermission(permission))
    }

    fn remove_permission(&self, key: &PermissionKey) -> Result<()> {
        self.commit(DirectoryChange::RemovePermission(key.clone()))
    }

    fn store_admin_permission(&self, permission: AdminPermission) -> Result<()> {
        self.commit(DirectoryChange::StoreAdminPermission(permission))
    }

    fn remove_admin_permission(&self, key: &PermissionKey) -> Result<()> {
        self.commit(DirectoryChange::RemoveAdminPermission(key.clone()))
    }
}

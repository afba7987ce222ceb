//! Directory entities: users, roles, admin roles, org units, permissions and
//! separation-of-duty sets.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::{AccessError, Result};
use crate::{OrgUnitName, RoleName, UserId};

// ============================================================================
// Roles
// ============================================================================

/// A role in the RBAC role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub description: String,
    pub constraint: Option<Constraint>,
}

impl Role {
    pub fn new(name: impl Into<RoleName>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            constraint: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// An administrative role (ARBAC02).
///
/// The range `[begin_range, end_range]` names the segment of the role
/// hierarchy this admin role may administer; `os_u` and `os_p` name the
/// user and permission org units it may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRole {
    pub name: RoleName,
    pub description: String,
    pub constraint: Option<Constraint>,
    pub begin_range: Option<RoleName>,
    pub end_range: Option<RoleName>,
    pub begin_inclusive: bool,
    pub end_inclusive: bool,
    pub os_u: BTreeSet<OrgUnitName>,
    pub os_p: BTreeSet<OrgUnitName>,
}

impl AdminRole {
    pub fn new(name: impl Into<RoleName>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            constraint: None,
            begin_range: None,
            end_range: None,
            begin_inclusive: false,
            end_inclusive: false,
            os_u: BTreeSet::new(),
            os_p: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Sets the administered role range.
    pub fn with_range(
        mut self,
        begin: impl Into<RoleName>,
        begin_inclusive: bool,
        end: impl Into<RoleName>,
        end_inclusive: bool,
    ) -> Self {
        self.begin_range = Some(begin.into());
        self.begin_inclusive = begin_inclusive;
        self.end_range = Some(end.into());
        self.end_inclusive = end_inclusive;
        self
    }

    pub fn with_user_pool(mut self, ou: impl Into<OrgUnitName>) -> Self {
        self.os_u.insert(ou.into());
        self
    }

    pub fn with_perm_pool(mut self, ou: impl Into<OrgUnitName>) -> Self {
        self.os_p.insert(ou.into());
        self
    }

    /// Returns `(begin, end)` if both endpoints are set.
    pub fn range(&self) -> Option<(&RoleName, &RoleName)> {
        match (&self.begin_range, &self.end_range) {
            (Some(begin), Some(end)) => Some((begin, end)),
            _ => None,
        }
    }
}

// ============================================================================
// Org Units
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgUnitKind {
    User,
    Perm,
}

/// An organizational unit grouping users or permission objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub name: OrgUnitName,
    pub kind: OrgUnitKind,
    pub description: String,
}

impl OrgUnit {
    pub fn new(name: impl Into<OrgUnitName>, kind: OrgUnitKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
        }
    }
}

// ============================================================================
// Assignments
// ============================================================================

/// Attribute binding on a role assignment, e.g. `location = "north"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleConstraint {
    pub key: String,
    pub value: String,
}

impl RoleConstraint {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role: RoleName,
    /// Overrides the role's own constraint when set.
    pub constraint: Option<Constraint>,
    pub role_constraints: Vec<RoleConstraint>,
}

impl UserRole {
    pub fn new(user_id: impl Into<UserId>, role: impl Into<RoleName>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            constraint: None,
            role_constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_role_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.role_constraints.push(RoleConstraint::new(key, value));
        self
    }
}

/// Assignment of an admin role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAdminRole {
    pub user_id: UserId,
    pub role: RoleName,
    pub constraint: Option<Constraint>,
}

impl UserAdminRole {
    pub fn new(user_id: impl Into<UserId>, role: impl Into<RoleName>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

// ============================================================================
// Users
// ============================================================================

/// A user with its assignments, as loaded from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub ou: OrgUnitName,
    pub constraint: Option<Constraint>,
    pub roles: Vec<UserRole>,
    pub admin_roles: Vec<UserAdminRole>,
}

impl User {
    pub fn new(user_id: impl Into<UserId>, ou: impl Into<OrgUnitName>) -> Self {
        Self {
            user_id: user_id.into(),
            ou: ou.into(),
            constraint: None,
            roles: Vec::new(),
            admin_roles: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn assigned_role(&self, role: &RoleName) -> Option<&UserRole> {
        self.roles.iter().find(|ur| &ur.role == role)
    }

    pub fn assigned_admin_role(&self, role: &RoleName) -> Option<&UserAdminRole> {
        self.admin_roles.iter().find(|uar| &uar.role == role)
    }

    pub fn role_names(&self) -> impl Iterator<Item = &RoleName> {
        self.roles.iter().map(|ur| &ur.role)
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Identity of a permission: an operation on an object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    pub object_name: String,
    pub operation_name: String,
}

impl PermissionKey {
    pub fn new(object_name: impl Into<String>, operation_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            operation_name: operation_name.into(),
        }
    }
}

impl Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object_name, self.operation_name)
    }
}

/// An operation on an object, granted to roles and users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub object_name: String,
    pub operation_name: String,
    /// Permission org unit of the object.
    pub ou: Option<OrgUnitName>,
    pub roles: BTreeSet<RoleName>,
    pub users: BTreeSet<UserId>,
}

impl Permission {
    pub fn new(object_name: impl Into<String>, operation_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            operation_name: operation_name.into(),
            ou: None,
            roles: BTreeSet::new(),
            users: BTreeSet::new(),
        }
    }

    pub fn with_ou(mut self, ou: impl Into<OrgUnitName>) -> Self {
        self.ou = Some(ou.into());
        self
    }

    pub fn granted_to_role(mut self, role: impl Into<RoleName>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn granted_to_user(mut self, user: impl Into<UserId>) -> Self {
        self.users.insert(user.into());
        self
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(self.object_name.clone(), self.operation_name.clone())
    }
}

/// A permission over administrative objects, granted to admin roles.
///
/// Shares the shape of [`Permission`]; `roles` names admin roles.
pub type AdminPermission = Permission;

// ============================================================================
// Separation of Duty
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdKind {
    /// Static: limits simultaneous assignment.
    Ssd,
    /// Dynamic: limits simultaneous activation.
    Dsd,
}

impl Display for SdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdKind::Ssd => write!(f, "SSD"),
            SdKind::Dsd => write!(f, "DSD"),
        }
    }
}

/// A separation-of-duty set.
///
/// At most `cardinality - 1` member roles may be assigned (SSD) or active
/// (DSD) for one user at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdSet {
    pub name: String,
    pub kind: SdKind,
    pub description: String,
    pub members: BTreeSet<RoleName>,
    pub cardinality: usize,
}

impl SdSet {
    pub fn new(
        name: impl Into<String>,
        kind: SdKind,
        members: impl IntoIterator<Item = RoleName>,
        cardinality: usize,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            members: members.into_iter().collect(),
            cardinality,
        }
    }

    pub fn contains(&self, role: &RoleName) -> bool {
        self.members.contains(role)
    }

    /// Checks `2 <= cardinality <= |members|`.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AccessError::ValidationFailed("SD set name is empty".into()));
        }
        if self.cardinality < 2 {
            return Err(AccessError::ValidationFailed(format!(
                "{} set {} cardinality {} is below 2",
                self.kind, self.name, self.cardinality
            )));
        }
        if self.cardinality > self.members.len() {
            return Err(AccessError::ValidationFailed(format!(
                "{} set {} cardinality {} exceeds its {} members",
                self.kind,
                self.name,
                self.cardinality,
                self.members.len()
            )));
        }
        Ok(())
    }
}

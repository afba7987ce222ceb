//! # bastion-types: Core types for `Bastion`
//!
//! This crate contains shared types used across the `Bastion` system:
//! - Entity names ([`UserId`], [`RoleName`], [`OrgUnitName`])
//! - Directory entities ([`User`], [`Role`], [`AdminRole`], [`OrgUnit`], [`Permission`])
//! - Assignments ([`UserRole`], [`UserAdminRole`], [`RoleConstraint`])
//! - Separation of duty sets ([`SdSet`], [`SdKind`])
//! - Temporal constraints ([`Constraint`], [`DayMask`])
//! - Sessions ([`Session`], [`Warning`], [`WarningCode`])
//! - Graph kinds ([`GraphKind`])
//! - The shared error taxonomy ([`AccessError`], [`TemporalFailure`], [`PasswordFailure`])

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod constraint;
pub mod entity;
pub mod error;
pub mod session;


pub use constraint::{Constraint, DayMask, parse_date, parse_time};
pub use entity::{
    AdminPermission, AdminRole, OrgUnit, OrgUnitKind, Permission, PermissionKey, Role,
    RoleConstraint, SdKind, SdSet, User, UserAdminRole, UserRole,
};
pub use error::{AccessError, PasswordFailure, Result, TemporalFailure};
pub use session::{Session, Warning, WarningCode, WarningKind};

// ============================================================================
// Entity Names - Clone (contain String, cheap to compare)
// ============================================================================

/// Unique identifier for a user in the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Name of a role or an administrative role.
///
/// Directory stores treat role names case-insensitively, so equality,
/// ordering and hashing ignore ASCII case while the original spelling is
/// kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for RoleName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for RoleName {}

impl PartialOrd for RoleName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RoleName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.0.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl std::hash::Hash for RoleName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RoleName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Name of an organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrgUnitName(String);

impl OrgUnitName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrgUnitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrgUnitName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for OrgUnitName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ============================================================================
// Graph Kinds - Copy (simple enum, no heap data)
// ============================================================================

/// The independent hierarchies maintained by the engine.
///
/// Each kind has its own edge relation; a name may appear in several
/// graphs without the edges interacting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    /// Inheritance between roles.
    Role,
    /// Inheritance between administrative roles.
    AdminRole,
    /// Containment between user organizational units.
    UserOrgUnit,
    /// Containment between permission organizational units.
    PermOrgUnit,
}

impl Display for GraphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphKind::Role => write!(f, "role"),
            GraphKind::AdminRole => write!(f, "admin-role"),
            GraphKind::UserOrgUnit => write!(f, "user-ou"),
            GraphKind::PermOrgUnit => write!(f, "perm-ou"),
        }
    }
}

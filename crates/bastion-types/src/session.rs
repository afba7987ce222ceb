//! Sessions and the warnings recorded while building them.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{User, UserAdminRole, UserRole};
use crate::error::{AccessError, TemporalFailure};
use crate::{RoleName, UserId};

// ============================================================================
// Warnings
// ============================================================================

/// Reason a role was skipped or a session was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    Temporal(TemporalFailure),
    DsdViolation,
    ActivationRejected,
    /// Password expires soon; see `Session::expiration_seconds`.
    PasswordExpiring,
    /// Password expired and a grace login was consumed.
    GraceLogin,
}

impl WarningCode {
    pub fn code(self) -> u32 {
        match self {
            WarningCode::Temporal(failure) => failure.code(),
            WarningCode::DsdViolation => 2061,
            WarningCode::ActivationRejected => 2062,
            WarningCode::PasswordExpiring => 1070,
            WarningCode::GraceLogin => 1071,
        }
    }

    /// Maps a role-local error to its warning code.
    pub fn from_error(error: &AccessError) -> Option<Self> {
        match error {
            AccessError::ConstraintViolation(failure) => Some(WarningCode::Temporal(*failure)),
            AccessError::DsdCardinalityViolation { .. } => Some(WarningCode::DsdViolation),
            AccessError::ActivationRejected { .. } => Some(WarningCode::ActivationRejected),
            _ => None,
        }
    }
}

/// What a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    Role,
    AdminRole,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    pub kind: WarningKind,
    pub role: Option<RoleName>,
    pub message: String,
}

impl Warning {
    pub fn role(kind: WarningKind, role: RoleName, error: &AccessError) -> Option<Self> {
        WarningCode::from_error(error).map(|code| Self {
            code,
            kind,
            role: Some(role),
            message: error.to_string(),
        })
    }

    pub fn password(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: WarningKind::Password,
            role: None,
            message: message.into(),
        }
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "[{}] {role}: {}", self.code.code(), self.message),
            None => write!(f, "[{}] {}", self.code.code(), self.message),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// An authenticated user's set of activated roles.
///
/// Sessions are plain values owned by the caller. Activation order is
/// preserved: roles appear in the order they were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user: User,
    pub activated_roles: Vec<UserRole>,
    pub activated_admin_roles: Vec<UserAdminRole>,
    pub error_id: u32,
    pub warnings: Vec<Warning>,
    /// Seconds until the password expires, when the authenticator warned.
    pub expiration_seconds: Option<u64>,
    /// Grace logins remaining after an expired password bind.
    pub grace_logins: Option<u32>,
    pub is_authenticated: bool,
    pub last_access: Option<NaiveDateTime>,
    /// Attributes supplied at creation, matched against role constraints.
    pub attributes: BTreeMap<String, String>,
}

impl Session {
    pub fn new(user: User, is_authenticated: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user,
            activated_roles: Vec::new(),
            activated_admin_roles: Vec::new(),
            error_id: 0,
            warnings: Vec::new(),
            expiration_seconds: None,
            grace_logins: None,
            is_authenticated,
            last_access: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.user_id
    }

    pub fn is_active(&self, role: &RoleName) -> bool {
        self.activated_roles.iter().any(|ur| &ur.role == role)
    }

    pub fn is_admin_active(&self, role: &RoleName) -> bool {
        self.activated_admin_roles.iter().any(|uar| &uar.role == role)
    }

    /// Names of the active roles in activation order.
    pub fn active_roles(&self) -> Vec<RoleName> {
        self.activated_roles.iter().map(|ur| ur.role.clone()).collect()
    }

    pub fn active_admin_roles(&self) -> Vec<RoleName> {
        self.activated_admin_roles
            .iter()
            .map(|uar| uar.role.clone())
            .collect()
    }

    pub fn warnings_for(&self, role: &RoleName) -> impl Iterator<Item = &Warning> {
        self.warnings
            .iter()
            .filter(move |w| w.role.as_ref() == Some(role))
    }
}

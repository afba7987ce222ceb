//! The shared error taxonomy.
//!
//! Every engine in the workspace reports failures through [`AccessError`].
//! Each variant carries a stable numeric code so callers that only see
//! integers (directory gateways, audit sinks) can still tell them apart.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GraphKind, RoleName, UserId};

/// Which temporal check rejected a constraint.
///
/// Variants are listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalFailure {
    /// Current day of week is not in the day mask.
    Day,
    /// Current date is outside the begin/end date window.
    Date,
    /// Current time of day is outside the begin/end time window.
    Time,
    /// Current date falls inside the lockout window.
    Lockout,
    /// The session has been idle longer than the timeout.
    Timeout,
}

impl TemporalFailure {
    pub fn code(self) -> u32 {
        match self {
            TemporalFailure::Day => 2050,
            TemporalFailure::Date => 2051,
            TemporalFailure::Time => 2052,
            TemporalFailure::Lockout => 2053,
            TemporalFailure::Timeout => 2054,
        }
    }
}

impl Display for TemporalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalFailure::Day => write!(f, "day of week not allowed"),
            TemporalFailure::Date => write!(f, "date outside allowed range"),
            TemporalFailure::Time => write!(f, "time of day outside allowed range"),
            TemporalFailure::Lockout => write!(f, "inside lockout period"),
            TemporalFailure::Timeout => write!(f, "session inactivity timeout"),
        }
    }
}

/// Password policy outcomes that end an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PasswordFailure {
    Locked,
    Expired,
    MustChange,
    /// Wrong password or unknown user.
    Invalid,
}

impl PasswordFailure {
    pub fn code(self) -> u32 {
        match self {
            PasswordFailure::Locked => 1060,
            PasswordFailure::Expired => 1061,
            PasswordFailure::MustChange => 1062,
            PasswordFailure::Invalid => 1063,
        }
    }
}

impl Display for PasswordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordFailure::Locked => write!(f, "account locked"),
            PasswordFailure::Expired => write!(f, "password expired"),
            PasswordFailure::MustChange => write!(f, "password must be changed"),
            PasswordFailure::Invalid => write!(f, "invalid credentials"),
        }
    }
}

/// Error type for every access-control operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// A user, role, permission or SD set does not exist.
    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    /// An entity with the same key already exists.
    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },

    /// Malformed constraint data, bad cardinality or an unsatisfiable change.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Adding the edge would let a node inherit from itself.
    #[error("cyclic {graph} relationship: {parent} -> {child}")]
    CyclicRelationship {
        graph: GraphKind,
        parent: String,
        child: String,
    },

    #[error("{graph} relationship already exists: {parent} -> {child}")]
    RelationshipExists {
        graph: GraphKind,
        parent: String,
        child: String,
    },

    #[error("{graph} relationship not found: {parent} -> {child}")]
    RelationshipNotFound {
        graph: GraphKind,
        parent: String,
        child: String,
    },

    /// A node still has edges and cannot be removed.
    #[error("{graph} node {node} still has relationships")]
    NodeInUse { graph: GraphKind, node: String },

    /// A temporal constraint rejected the request.
    #[error("constraint violation: {0}")]
    ConstraintViolation(TemporalFailure),

    #[error("static separation of duty violated: {role} conflicts in set {set} (cardinality {cardinality})")]
    SsdCardinalityViolation {
        set: String,
        role: RoleName,
        cardinality: usize,
    },

    #[error("dynamic separation of duty violated: {role} conflicts in set {set} (cardinality {cardinality})")]
    DsdCardinalityViolation {
        set: String,
        role: RoleName,
        cardinality: usize,
    },

    /// An activation filter (role constraint binding) rejected the role.
    #[error("role {role} rejected by activation filter: {reason}")]
    ActivationRejected { role: RoleName, reason: String },

    #[error("role {role} is not assigned to user {user}")]
    NotAssigned { user: UserId, role: RoleName },

    #[error("role {role} is already active")]
    AlreadyActive { role: RoleName },

    #[error("role {role} is not active")]
    NotActive { role: RoleName },

    /// A delegated range or OU pool check failed, or the session is not
    /// allowed to do what it asked.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An admin role's range does not follow the role hierarchy.
    #[error("invalid range for admin role {admin_role}: {begin} .. {end}")]
    InvalidRange {
        admin_role: RoleName,
        begin: RoleName,
        end: RoleName,
    },

    #[error("password error: {0}")]
    Password(PasswordFailure),

    /// A collaborator (directory store, authenticator) failed.
    #[error("backing store error: {0}")]
    BackingStore(String),
}

/// Result type for access-control operations.
pub type Result<T> = std::result::Result<T, AccessError>;

impl AccessError {
    pub fn not_found(entity: &'static str, name: impl Display) -> Self {
        AccessError::NotFound {
            entity,
            name: name.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, name: impl Display) -> Self {
        AccessError::AlreadyExists {
            entity,
            name: name.to_string(),
        }
    }

    /// Stable numeric code for this error.
    pub fn code(&self) -> u32 {
        match self {
            AccessError::NotFound { .. } => 1000,
            AccessError::AlreadyExists { .. } => 1001,
            AccessError::ValidationFailed(_) => 1002,
            AccessError::CyclicRelationship { .. } => 1010,
            AccessError::RelationshipExists { .. } => 1011,
            AccessError::RelationshipNotFound { .. } => 1012,
            AccessError::NodeInUse { .. } => 1013,
            AccessError::ConstraintViolation(failure) => failure.code(),
            AccessError::SsdCardinalityViolation { .. } => 2060,
            AccessError::DsdCardinalityViolation { .. } => 2061,
            AccessError::ActivationRejected { .. } => 2062,
            AccessError::NotAssigned { .. } => 2070,
            AccessError::AlreadyActive { .. } => 2071,
            AccessError::NotActive { .. } => 2072,
            AccessError::Unauthorized(_) => 2080,
            AccessError::InvalidRange { .. } => 2081,
            AccessError::Password(failure) => failure.code(),
            AccessError::BackingStore(_) => 9000,
        }
    }

    /// True for errors that `create_session` downgrades to a per-role warning.
    pub fn is_role_local(&self) -> bool {
        matches!(
            self,
            AccessError::ConstraintViolation(_)
                | AccessError::DsdCardinalityViolation { .. }
                | AccessError::ActivationRejected { .. }
        )
    }
}

impl From<TemporalFailure> for AccessError {
    fn from(failure: TemporalFailure) -> Self {
        AccessError::ConstraintViolation(failure)
    }
}

impl From<PasswordFailure> for AccessError {
    fn from(failure: PasswordFailure) -> Self {
        AccessError::Password(failure)
    }
}

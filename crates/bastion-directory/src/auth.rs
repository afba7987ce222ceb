//! Credential verification.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bastion_types::{PasswordFailure, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// Outcome of a bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindOutcome {
    Success,
    InvalidCredentials,
    Locked,
    Expired,
    MustChange,
}

/// Result of [`Authenticator::bind`], including password-policy warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub outcome: BindOutcome,
    /// Seconds until the password expires, if the policy warns.
    pub expiration_seconds: Option<u64>,
    /// Grace logins left after binding with an expired password.
    pub grace_logins: Option<u32>,
}

impl AuthResult {
    pub fn success() -> Self {
        Self {
            outcome: BindOutcome::Success,
            expiration_seconds: None,
            grace_logins: None,
        }
    }

    pub fn failed(outcome: BindOutcome) -> Self {
        Self {
            outcome,
            expiration_seconds: None,
            grace_logins: None,
        }
    }

    /// Converts a failed outcome into the matching password failure.
    pub fn check(&self) -> std::result::Result<(), PasswordFailure> {
        match self.outcome {
            BindOutcome::Success => Ok(()),
            BindOutcome::InvalidCredentials => Err(PasswordFailure::Invalid),
            BindOutcome::Locked => Err(PasswordFailure::Locked),
            BindOutcome::Expired => Err(PasswordFailure::Expired),
            BindOutcome::MustChange => Err(PasswordFailure::MustChange),
        }
    }
}

/// Verifies a user's password against the backing store's policy.
pub trait Authenticator: Send + Sync {
    /// Binds as `user_id`.
    ///
    /// Policy rejections are reported in [`AuthResult::outcome`]; `Err` is
    /// reserved for the authenticator itself failing.
    fn bind(&self, user_id: &UserId, password: &str) -> Result<AuthResult>;
}

// ============================================================================
// In-memory authenticator
// ============================================================================

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Secret(Vec<u8>);

impl Secret {
    fn matches(&self, candidate: &[u8]) -> bool {
        if self.0.len() != candidate.len() {
            return false;
        }
        self.0
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[derive(Clone)]
struct Credential {
    secret: Secret,
    locked: bool,
    expired: bool,
    must_change: bool,
    grace_logins: u32,
    expiration_warning: Option<u64>,
}

/// Password state held in memory.
#[derive(Default)]
pub struct MemoryAuthenticator {
    credentials: RwLock<HashMap<UserId, Credential>>,
}

impl std::fmt::Debug for MemoryAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MemoryAuthenticator")
            .field("users", &count)
            .finish_non_exhaustive()
    }
}

impl MemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a password and clears every policy flag.
    pub fn set_password(&self, user_id: impl Into<UserId>, password: &str) {
        let credential = Credential {
            secret: Secret(password.as_bytes().to_vec()),
            locked: false,
            expired: false,
            must_change: false,
            grace_logins: 0,
            expiration_warning: None,
        };
        self.write().insert(user_id.into(), credential);
    }

    pub fn with_password(self, user_id: impl Into<UserId>, password: &str) -> Self {
        self.set_password(user_id, password);
        self
    }

    pub fn lock(&self, user_id: &UserId) {
        self.update(user_id, |c| c.locked = true);
    }

    pub fn unlock(&self, user_id: &UserId) {
        self.update(user_id, |c| c.locked = false);
    }

    /// Marks the password expired, allowing `grace_logins` more binds.
    pub fn expire(&self, user_id: &UserId, grace_logins: u32) {
        self.update(user_id, |c| {
            c.expired = true;
            c.grace_logins = grace_logins;
        });
    }

    pub fn require_change(&self, user_id: &UserId) {
        self.update(user_id, |c| c.must_change = true);
    }

    /// Reports an upcoming expiry on every successful bind.
    pub fn warn_expiry(&self, user_id: &UserId, seconds: u64) {
        self.update(user_id, |c| c.expiration_warning = Some(seconds));
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, Credential>> {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, user_id: &UserId, f: impl FnOnce(&mut Credential)) {
        if let Some(credential) = self.write().get_mut(user_id) {
            f(credential);
        }
    }
}

impl Authenticator for MemoryAuthenticator {
    fn bind(&self, user_id: &UserId, password: &str) -> Result<AuthResult> {
        let mut credentials = self.write();
        let Some(credential) = credentials.get_mut(user_id) else {
            warn!(user = %user_id, "bind for unknown user");
            return Ok(AuthResult::failed(BindOutcome::InvalidCredentials));
        };

        if !credential.secret.matches(password.as_bytes()) {
            warn!(user = %user_id, "bind with invalid password");
            return Ok(AuthResult::failed(BindOutcome::InvalidCredentials));
        }
        if credential.locked {
            return Ok(AuthResult::failed(BindOutcome::Locked));
        }
        if credential.must_change {
            return Ok(AuthResult::failed(BindOutcome::MustChange));
        }

        let mut result = AuthResult::success();
        result.expiration_seconds = credential.expiration_warning;

        if credential.expired {
            if credential.grace_logins == 0 {
                return Ok(AuthResult::failed(BindOutcome::Expired));
            }
            credential.grace_logins -= 1;
            result.grace_logins = Some(credential.grace_logins);
        }

        Ok(result)
    }
}

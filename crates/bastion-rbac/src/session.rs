//! Session construction and role activation.
//!
//! A session moves through `Unauthenticated -> Authenticated -> Built` inside
//! [`SessionEngine::create_session`]; afterwards it is a plain value owned by
//! the caller and mutated through [`SessionEngine::add_active_role`] and
//! [`SessionEngine::drop_active_role`].
//!
//! Per-role failures during creation (temporal constraint, activation
//! filter, DSD) skip the role and record a [`Warning`]. Everything else ends
//! the call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bastion_directory::{Authenticator, DirectoryStore};
use bastion_hierarchy::HierarchyGraph;
use bastion_types::{
    AccessError, Constraint, PasswordFailure, Result, RoleName, SdKind, Session, UserAdminRole,
    UserId, UserRole, Warning, WarningCode, WarningKind,
};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::activation::{ActivationFilter, RoleConstraintFilter};
use crate::clock::{Clock, SystemClock};
use crate::separation::{self, SdCatalog};
use crate::temporal;

// ============================================================================
// Requests and policy
// ============================================================================

/// Input to [`SessionEngine::create_session`].
#[derive(Clone)]
pub struct SessionRequest {
    pub user_id: UserId,
    password: Option<Zeroizing<String>>,
    /// Skip the authenticator; the caller vouches for the user.
    pub trusted: bool,
    /// Roles to activate, in order. `None` means "the session policy decides".
    pub roles: Option<Vec<RoleName>>,
    pub admin_roles: Option<Vec<RoleName>>,
    /// Attributes matched against role constraints.
    pub attributes: BTreeMap<String, String>,
}

impl SessionRequest {
    /// A request authenticated by password.
    pub fn password(user_id: impl Into<UserId>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: Some(Zeroizing::new(password.into())),
            trusted: false,
            roles: None,
            admin_roles: None,
            attributes: BTreeMap::new(),
        }
    }

    /// A request that bypasses the authenticator.
    pub fn trusted(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            password: None,
            trusted: true,
            roles: None,
            admin_roles: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_admin_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.admin_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("trusted", &self.trusted)
            .field("roles", &self.roles)
            .field("admin_roles", &self.admin_roles)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Knobs that shape session behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Activate every assigned role when the request names none.
    pub activate_all_roles: bool,
    /// Revalidate active roles before every access decision.
    pub revalidate_on_access: bool,
    /// Check the user's own constraint for trusted requests too.
    pub trusted_requires_user_constraint: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            activate_all_roles: true,
            revalidate_on_access: true,
            trusted_requires_user_constraint: true,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Builds and mutates sessions against a directory and the live hierarchies.
pub struct SessionEngine {
    pub(crate) directory: Arc<dyn DirectoryStore>,
    authenticator: Arc<dyn Authenticator>,
    pub(crate) roles: Arc<HierarchyGraph<RoleName>>,
    pub(crate) admin_roles: Arc<HierarchyGraph<RoleName>>,
    sd_sets: Arc<SdCatalog>,
    clock: Arc<dyn Clock>,
    filter: Arc<dyn ActivationFilter>,
    pub(crate) policy: SessionPolicy,
    pub(crate) audit_enabled: bool,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("policy", &self.policy)
            .field("audit_enabled", &self.audit_enabled)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        authenticator: Arc<dyn Authenticator>,
        roles: Arc<HierarchyGraph<RoleName>>,
        admin_roles: Arc<HierarchyGraph<RoleName>>,
        sd_sets: Arc<SdCatalog>,
    ) -> Self {
        Self {
            directory,
            authenticator,
            roles,
            admin_roles,
            sd_sets,
            clock: Arc::new(SystemClock),
            filter: Arc::new(RoleConstraintFilter),
            policy: SessionPolicy::default(),
            audit_enabled: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ActivationFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Authenticates the request and activates the candidate roles.
    pub fn create_session(&self, request: SessionRequest) -> Result<Session> {
        let SessionRequest {
            user_id,
            password,
            trusted,
            roles,
            admin_roles,
            attributes,
        } = request;

        let auth = if trusted {
            None
        } else {
            let password = password.ok_or(AccessError::Password(PasswordFailure::Invalid))?;
            let result = self.authenticator.bind(&user_id, password.as_str())?;
            if let Err(failure) = result.check() {
                if self.audit_enabled {
                    warn!(user = %user_id, code = failure.code(), "session denied: {failure}");
                }
                return Err(failure.into());
            }
            Some(result)
        };

        let user = self.directory.load_user(&user_id)?;
        let now = self.clock.now();

        if !trusted || self.policy.trusted_requires_user_constraint {
            temporal::check(user.constraint.as_ref(), now, None)?;
        }

        let mut session = Session::new(user, !trusted);
        session.attributes = attributes;

        if let Some(auth) = auth {
            session.expiration_seconds = auth.expiration_seconds;
            session.grace_logins = auth.grace_logins;
            if let Some(seconds) = auth.expiration_seconds {
                session.warnings.push(Warning::password(
                    WarningCode::PasswordExpiring,
                    format!("password expires in {seconds} seconds"),
                ));
            }
            if let Some(remaining) = auth.grace_logins {
                session.warnings.push(Warning::password(
                    WarningCode::GraceLogin,
                    format!("password expired, {remaining} grace logins left"),
                ));
            }
        }

        let candidates = self.select(&session.user.roles, roles, |ur| &ur.role)?;
        for assignment in candidates {
            let outcome = self.admit_role(&session, &assignment, now);
            self.settle(&mut session, WarningKind::Role, assignment, outcome, |s| {
                &mut s.activated_roles
            })?;
        }

        let admin_candidates = self.select(&session.user.admin_roles, admin_roles, |uar| &uar.role)?;
        for assignment in admin_candidates {
            let outcome = self.admit_admin_role(&session, &assignment, now);
            self.settle(&mut session, WarningKind::AdminRole, assignment, outcome, |s| {
                &mut s.activated_admin_roles
            })?;
        }

        session.last_access = Some(now);

        if self.audit_enabled {
            info!(
                session = %session.session_id,
                user = %session.user_id(),
                trusted,
                roles = ?session.active_roles(),
                admin_roles = ?session.active_admin_roles(),
                warnings = session.warnings.len(),
                "Session created"
            );
        }
        Ok(session)
    }

    /// Picks the candidate assignments, in request order.
    fn select<A, F>(
        &self,
        assigned: &[A],
        requested: Option<Vec<RoleName>>,
        name: F,
    ) -> Result<Vec<A>>
    where
        A: Clone,
        F: Fn(&A) -> &RoleName,
    {
        let Some(requested) = requested else {
            return Ok(if self.policy.activate_all_roles {
                assigned.to_vec()
            } else {
                Vec::new()
            });
        };

        let mut seen = BTreeSet::new();
        let mut picked = Vec::with_capacity(requested.len());
        for role in requested {
            if !seen.insert(role.clone()) {
                continue;
            }
            let assignment = assigned
                .iter()
                .find(|&a| name(a) == &role)
                .ok_or_else(|| AccessError::Unauthorized(format!("role {role} is not assigned")))?;
            picked.push(assignment.clone());
        }
        Ok(picked)
    }

    /// Appends an admitted assignment, or records a warning for a role-local
    /// failure. Other failures are returned.
    fn settle<A, F>(
        &self,
        session: &mut Session,
        kind: WarningKind,
        assignment: A,
        outcome: Result<()>,
        list: F,
    ) -> Result<()>
    where
        A: Assignment,
        F: FnOnce(&mut Session) -> &mut Vec<A>,
    {
        match outcome {
            Ok(()) => {
                list(session).push(assignment);
                Ok(())
            }
            Err(err) if err.is_role_local() => {
                if self.audit_enabled {
                    warn!(
                        user = %session.user_id(),
                        role = %assignment.role(),
                        code = err.code(),
                        "Role skipped: {err}"
                    );
                }
                if let Some(warning) = Warning::role(kind, assignment.role().clone(), &err) {
                    session.warnings.push(warning);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn admit_role(&self, session: &Session, assignment: &UserRole, now: NaiveDateTime) -> Result<()> {
        let role = self.directory.load_role(&assignment.role)?;
        let constraint = assignment.constraint.as_ref().or(role.constraint.as_ref());
        temporal::check(constraint, now, None)?;

        self.filter
            .admit(assignment, &session.attributes)
            .map_err(|reason| AccessError::ActivationRejected {
                role: assignment.role.clone(),
                reason,
            })?;

        let catalog = self.sd_sets.snapshot();
        separation::check_activation(
            session.user_id(),
            &assignment.role,
            &session.active_roles(),
            catalog.of_kind(SdKind::Dsd),
            &self.roles.snapshot(),
        )
    }

    fn admit_admin_role(
        &self,
        session: &Session,
        assignment: &UserAdminRole,
        now: NaiveDateTime,
    ) -> Result<()> {
        let role = self.directory.load_admin_role(&assignment.role)?;
        let constraint = assignment.constraint.as_ref().or(role.constraint.as_ref());
        temporal::check(constraint, now, None)?;

        let catalog = self.sd_sets.snapshot();
        separation::check_activation(
            session.user_id(),
            &assignment.role,
            &session.active_admin_roles(),
            catalog.of_kind(SdKind::Dsd),
            &self.admin_roles.snapshot(),
        )
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Activates an assigned role, appending it to the session.
    ///
    /// Assignments are re-read from the directory, so a role assigned after
    /// the session was built can be activated.
    pub fn add_active_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        session.user = self.directory.load_user(session.user_id())?;
        let assignment = session
            .user
            .assigned_role(role)
            .cloned()
            .ok_or_else(|| AccessError::NotAssigned {
                user: session.user_id().clone(),
                role: role.clone(),
            })?;
        if session.is_active(role) {
            return Err(AccessError::AlreadyActive { role: role.clone() });
        }

        let now = self.clock.now();
        self.admit_role(session, &assignment, now)?;
        session.activated_roles.push(assignment);
        session.last_access = Some(now);

        if self.audit_enabled {
            info!(session = %session.session_id, user = %session.user_id(), role = %role, "Role activated");
        }
        Ok(())
    }

    /// Deactivates a role. No constraints are consulted.
    pub fn drop_active_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        let Some(index) = session.activated_roles.iter().position(|ur| &ur.role == role) else {
            return Err(AccessError::NotActive { role: role.clone() });
        };
        session.activated_roles.remove(index);

        if self.audit_enabled {
            info!(session = %session.session_id, user = %session.user_id(), role = %role, "Role deactivated");
        }
        Ok(())
    }

    pub fn add_active_admin_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        session.user = self.directory.load_user(session.user_id())?;
        let assignment = session
            .user
            .assigned_admin_role(role)
            .cloned()
            .ok_or_else(|| AccessError::NotAssigned {
                user: session.user_id().clone(),
                role: role.clone(),
            })?;
        if session.is_admin_active(role) {
            return Err(AccessError::AlreadyActive { role: role.clone() });
        }

        let now = self.clock.now();
        self.admit_admin_role(session, &assignment, now)?;
        session.activated_admin_roles.push(assignment);
        session.last_access = Some(now);

        if self.audit_enabled {
            info!(session = %session.session_id, user = %session.user_id(), admin_role = %role, "Admin role activated");
        }
        Ok(())
    }

    pub fn drop_active_admin_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        let Some(index) = session
            .activated_admin_roles
            .iter()
            .position(|uar| &uar.role == role)
        else {
            return Err(AccessError::NotActive { role: role.clone() });
        };
        session.activated_admin_roles.remove(index);

        if self.audit_enabled {
            info!(session = %session.session_id, user = %session.user_id(), admin_role = %role, "Admin role deactivated");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Revalidation
    // ------------------------------------------------------------------------

    /// Re-runs temporal checks on the user and every active role.
    ///
    /// Inactivity is measured from `session.last_access`. Roles that no
    /// longer pass are dropped with a warning; a failing user constraint
    /// fails the call. On success `last_access` is stamped with the current
    /// time. A directory failure is returned with the session unchanged.
    pub fn revalidate(&self, session: &mut Session) -> Result<()> {
        let now = self.clock.now();
        let last_access = session.last_access;

        if session.is_authenticated || self.policy.trusted_requires_user_constraint {
            if let Err(err) = temporal::check(session.user.constraint.as_ref(), now, last_access) {
                if self.audit_enabled {
                    warn!(session = %session.session_id, user = %session.user_id(), "Session invalid: {err}");
                }
                return Err(err);
            }
        }

        // Every activation is evaluated before the session is touched, so a
        // failing directory leaves both lists as they were.
        let role_outcomes = Self::outcomes(&session.activated_roles, |assignment| {
            self.role_constraint(assignment)
                .and_then(|c| temporal::check(c.as_ref(), now, last_access))
        })?;
        let admin_outcomes = Self::outcomes(&session.activated_admin_roles, |assignment| {
            self.admin_role_constraint(assignment)
                .and_then(|c| temporal::check(c.as_ref(), now, last_access))
        })?;

        let roles = std::mem::take(&mut session.activated_roles);
        for (assignment, outcome) in roles.into_iter().zip(role_outcomes) {
            self.retain(session, WarningKind::Role, assignment, outcome, |s| {
                &mut s.activated_roles
            })?;
        }

        let admin_roles = std::mem::take(&mut session.activated_admin_roles);
        for (assignment, outcome) in admin_roles.into_iter().zip(admin_outcomes) {
            self.retain(session, WarningKind::AdminRole, assignment, outcome, |s| {
                &mut s.activated_admin_roles
            })?;
        }

        session.last_access = Some(now);
        Ok(())
    }

    /// Checks each assignment, keeping deleted-role and role-local failures
    /// as outcomes. The first other failure is returned.
    fn outcomes<A, F>(assignments: &[A], check: F) -> Result<Vec<Result<()>>>
    where
        F: Fn(&A) -> Result<()>,
    {
        assignments
            .iter()
            .map(|assignment| match check(assignment) {
                Err(err) if !matches!(err, AccessError::NotFound { .. }) && !err.is_role_local() => {
                    Err(err)
                }
                outcome => Ok(outcome),
            })
            .collect()
    }

    /// Like [`Self::settle`], but a role deleted from the directory is dropped
    /// quietly instead of failing the revalidation.
    fn retain<A, F>(
        &self,
        session: &mut Session,
        kind: WarningKind,
        assignment: A,
        outcome: Result<()>,
        list: F,
    ) -> Result<()>
    where
        A: Assignment,
        F: FnOnce(&mut Session) -> &mut Vec<A>,
    {
        if let Err(AccessError::NotFound { .. }) = outcome {
            debug!(user = %session.user_id(), role = %assignment.role(), "active role no longer exists");
            return Ok(());
        }
        self.settle(session, kind, assignment, outcome, list)
    }

    fn role_constraint(&self, assignment: &UserRole) -> Result<Option<Constraint>> {
        if assignment.constraint.is_some() {
            return Ok(assignment.constraint.clone());
        }
        Ok(self.directory.load_role(&assignment.role)?.constraint)
    }

    fn admin_role_constraint(&self, assignment: &UserAdminRole) -> Result<Option<Constraint>> {
        if assignment.constraint.is_some() {
            return Ok(assignment.constraint.clone());
        }
        Ok(self.directory.load_admin_role(&assignment.role)?.constraint)
    }
}

/// Shared view of role and admin-role assignments.
pub(crate) trait Assignment {
    fn role(&self) -> &RoleName;
}

impl Assignment for UserRole {
    fn role(&self) -> &RoleName {
        &self.role
    }
}

impl Assignment for UserAdminRole {
    fn role(&self) -> &RoleName {
        &self.role
    }
}

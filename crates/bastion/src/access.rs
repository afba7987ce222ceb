//! Session handle: creating sessions and answering access questions.

use std::collections::BTreeSet;
use std::sync::Arc;

use bastion_rbac::{PermissionSet, SessionRequest};
use bastion_types::{PermissionKey, Result, RoleName, Session};

use crate::bastion::BastionInner;

/// Sessions and access decisions for regular and admin roles.
///
/// Sessions are plain values owned by the caller. Every method that takes
/// `&mut Session` may drop roles that no longer pass their constraints,
/// recording a warning for each, when `session.revalidate_on_access` is on.
#[derive(Clone)]
pub struct AccessManager {
    inner: Arc<BastionInner>,
}

impl AccessManager {
    pub(crate) fn new(inner: Arc<BastionInner>) -> Self {
        Self { inner }
    }

    /// Authenticates (unless trusted) and activates the requested roles.
    pub fn create_session(&self, request: SessionRequest) -> Result<Session> {
        self.inner.sessions.create_session(request)
    }

    pub fn add_active_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        self.inner.sessions.add_active_role(session, role)
    }

    pub fn drop_active_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        self.inner.sessions.drop_active_role(session, role)
    }

    /// Re-runs temporal checks on the session and stamps its last access.
    pub fn revalidate(&self, session: &mut Session) -> Result<()> {
        self.inner.sessions.revalidate(session)
    }

    /// True if `permission` is granted to the session's authorized roles or
    /// directly to its user.
    pub fn check_access(&self, session: &mut Session, permission: &PermissionKey) -> Result<bool> {
        self.inner.sessions.check_access(session, permission)
    }

    pub fn session_permissions(&self, session: &mut Session) -> Result<PermissionSet> {
        self.inner.sessions.session_permissions(session)
    }

    /// Active roles plus every role they inherit.
    pub fn authorized_roles(&self, session: &mut Session) -> Result<BTreeSet<RoleName>> {
        self.inner.sessions.authorized_roles(session)
    }

    // ------------------------------------------------------------------------
    // Admin roles
    // ------------------------------------------------------------------------

    pub fn add_active_admin_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        self.inner.sessions.add_active_admin_role(session, role)
    }

    pub fn drop_active_admin_role(&self, session: &mut Session, role: &RoleName) -> Result<()> {
        self.inner.sessions.drop_active_admin_role(session, role)
    }

    pub fn check_admin_access(
        &self,
        session: &mut Session,
        permission: &PermissionKey,
    ) -> Result<bool> {
        self.inner.sessions.check_admin_access(session, permission)
    }

    pub fn session_admin_permissions(&self, session: &mut Session) -> Result<PermissionSet> {
        self.inner.sessions.session_admin_permissions(session)
    }

    pub fn authorized_admin_roles(&self, session: &mut Session) -> Result<BTreeSet<RoleName>> {
        self.inner.sessions.authorized_admin_roles(session)
    }
}

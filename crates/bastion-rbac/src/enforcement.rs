//! Access decisions over a built session.
//!
//! Every query first revalidates the session when the policy asks for it,
//! then computes the authorized-role closure (active roles plus everything
//! they inherit) from the current hierarchy snapshot.

use std::collections::BTreeSet;

use bastion_directory::DirectoryError;
use bastion_types::{PermissionKey, Result, RoleName, Session};
use tracing::{info, warn};

use crate::permissions::PermissionSet;
use crate::session::SessionEngine;

impl SessionEngine {
    fn prepare(&self, session: &mut Session) -> Result<()> {
        if self.policy.revalidate_on_access {
            self.revalidate(session)
        } else {
            session.last_access = Some(self.now());
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------------

    /// Returns `true` if the permission is granted to a role in the session's
    /// authorized closure or directly to the session's user.
    ///
    /// An unknown permission is a denial, not an error.
    ///
    /// **Audit:** Logs every decision.
    pub fn check_access(&self, session: &mut Session, permission: &PermissionKey) -> Result<bool> {
        self.prepare(session)?;

        let granted = match self.directory.load_permission(permission) {
            Ok(granted) => granted,
            Err(DirectoryError::NotFound { .. }) => {
                if self.audit_enabled {
                    warn!(user = %session.user_id(), permission = %permission, "Access denied: unknown permission");
                }
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let closure = self.roles.closure(session.activated_roles.iter().map(|ur| &ur.role));
        let via_role = granted.roles.iter().find(|role| closure.contains(*role));
        let allowed = via_role.is_some() || granted.users.contains(session.user_id());

        if self.audit_enabled {
            if allowed {
                info!(
                    user = %session.user_id(),
                    permission = %permission,
                    role = ?via_role,
                    "Access granted"
                );
            } else {
                warn!(
                    user = %session.user_id(),
                    permission = %permission,
                    roles = ?session.active_roles(),
                    "Access denied"
                );
            }
        }
        Ok(allowed)
    }

    /// Permissions reachable from the session, de-duplicated by
    /// `(object, operation)`.
    pub fn session_permissions(&self, session: &mut Session) -> Result<PermissionSet> {
        self.prepare(session)?;
        let closure = self.roles.closure(session.activated_roles.iter().map(|ur| &ur.role));
        let found = self.directory.find_permissions(&closure, session.user_id())?;
        Ok(PermissionSet::new(found))
    }

    /// The authorized-role closure of the session's active roles.
    pub fn authorized_roles(&self, session: &mut Session) -> Result<BTreeSet<RoleName>> {
        self.prepare(session)?;
        Ok(self.roles.closure(session.activated_roles.iter().map(|ur| &ur.role)))
    }

    // ------------------------------------------------------------------------
    // Admin roles
    // ------------------------------------------------------------------------

    /// [`Self::check_access`] for admin permissions over the admin-role
    /// hierarchy.
    pub fn check_admin_access(
        &self,
        session: &mut Session,
        permission: &PermissionKey,
    ) -> Result<bool> {
        self.prepare(session)?;

        let granted = match self.directory.load_admin_permission(permission) {
            Ok(granted) => granted,
            Err(DirectoryError::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let closure = self
            .admin_roles
            .closure(session.activated_admin_roles.iter().map(|uar| &uar.role));
        let allowed = granted.roles.iter().any(|role| closure.contains(role))
            || granted.users.contains(session.user_id());

        if self.audit_enabled {
            if allowed {
                info!(user = %session.user_id(), permission = %permission, "Admin access granted");
            } else {
                warn!(
                    user = %session.user_id(),
                    permission = %permission,
                    admin_roles = ?session.active_admin_roles(),
                    "Admin access denied"
                );
            }
        }
        Ok(allowed)
    }

    pub fn session_admin_permissions(&self, session: &mut Session) -> Result<PermissionSet> {
        self.prepare(session)?;
        let closure = self.authorized_admin_closure(session);
        let found = self.directory.find_admin_permissions(&closure, session.user_id())?;
        Ok(PermissionSet::new(found))
    }

    pub fn authorized_admin_roles(&self, session: &mut Session) -> Result<BTreeSet<RoleName>> {
        self.prepare(session)?;
        Ok(self.authorized_admin_closure(session))
    }

    /// Admin-role closure without revalidation, for delegated checks that
    /// already hold a validated session.
    pub fn authorized_admin_closure(&self, session: &Session) -> BTreeSet<RoleName> {
        self.admin_roles
            .closure(session.activated_admin_roles.iter().map(|uar| &uar.role))
    }
}

//! # Bastion
//!
//! Role-based access control with delegated administration.
//!
//! Bastion is a policy-decision core: it builds sessions, answers access
//! questions and checks administrative changes. It never owns entity data;
//! users, roles and permissions live behind a [`DirectoryStore`], and
//! credentials are verified by an [`Authenticator`].
//!
//! - **Core RBAC** - sessions, role activation, `check_access`
//! - **Hierarchical RBAC** - roles inherit from their children
//! - **Separation of duty** - static (assignment) and dynamic (activation) sets
//! - **Delegated administration** - ARBAC02 role ranges and org-unit pools
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Bastion                              │
//! │  ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//! │  │  access  │   │  admin   │   │ delegated  │   │   review   │  │
//! │  │(sessions)│   │ (writes) │   │ (ARBAC02)  │   │ (queries)  │  │
//! │  └────┬─────┘   └────┬─────┘   └─────┬──────┘   └─────┬──────┘  │
//! │       │              │               │                │         │
//! │  ┌────▼──────────────▼───────────────▼────────────────▼──────┐  │
//! │  │  hierarchy snapshots (arc-swap)  ·  SD-set catalog        │  │
//! │  └────────────────────────────┬──────────────────────────────┘  │
//! └───────────────────────────────┼──────────────────────────────────┘
//!                                 ▼
//!                 DirectoryStore  ·  Authenticator
//! ```
//!
//! # Quick Start
//!
//! ```
//! use bastion::{Bastion, OrgUnit, OrgUnitKind, Permission, PermissionKey, Role, SessionRequest, User, UserRole};
//!
//! let bastion = Bastion::in_memory()?;
//! let admin = bastion.admin();
//!
//! admin.add_org_unit(OrgUnit::new("branch-1", OrgUnitKind::User))?;
//! admin.add_role(Role::new("teller"))?;
//! admin.add_user(User::new("jdoe", "branch-1"))?;
//! admin.assign_user(UserRole::new("jdoe", "teller"))?;
//! admin.add_permission(Permission::new("account", "read").granted_to_role("teller"))?;
//!
//! let access = bastion.access();
//! let mut session = access.create_session(SessionRequest::trusted("jdoe"))?;
//! assert!(access.check_access(&mut session, &PermissionKey::new("account", "read"))?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - **Facade**: [`Bastion`], [`AccessManager`], [`AdminManager`],
//!   [`DelegatedManager`], [`ReviewManager`]
//! - **Engines**: [`bastion_rbac`], [`bastion_arbac`], [`bastion_hierarchy`]
//! - **Collaborators**: [`bastion_directory`]

mod access;
mod admin;
mod bastion;
mod delegated;
mod error;
mod review;

// Facade
pub use access::AccessManager;
pub use admin::AdminManager;
pub use bastion::{Bastion, BastionBuilder};
pub use delegated::DelegatedManager;
pub use error::{BastionError, Result};
pub use review::ReviewManager;

// Re-export configuration
pub use bastion_config::{BastionConfig, ConfigLoader};

// Re-export shared types
pub use bastion_types::{
    AccessError, AdminPermission, AdminRole, Constraint, DayMask, GraphKind, OrgUnit,
    OrgUnitKind, OrgUnitName, PasswordFailure, Permission, PermissionKey, Role, RoleConstraint,
    RoleName, SdKind, SdSet, Session, TemporalFailure, User, UserAdminRole, UserId, UserRole,
    Warning, WarningCode, WarningKind,
};

// Re-export engine types
pub use bastion_arbac::{AdminOperation, Decision};
pub use bastion_rbac::{
    ActivationFilter, AllowAll, Clock, FixedClock, PermissionSet, RoleConstraintFilter,
    SessionPolicy, SessionRequest, SystemClock,
};

// Re-export collaborators
pub use bastion_directory::{
    AuthResult, Authenticator, BindOutcome, DirectoryError, DirectoryStore, MemoryAuthenticator,
    MemoryDirectory,
};

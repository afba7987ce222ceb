//! # bastion-rbac: ANSI RBAC session engine
//!
//! Core, hierarchical and constrained RBAC:
//! - **Temporal constraints** (day mask, date and time windows, lockout,
//!   inactivity timeout)
//! - **Separation of duty** (SSD at assignment, DSD at activation)
//! - **Sessions** built from an authenticator and a directory, with
//!   best-effort role activation
//! - **Access decisions** over the authorized-role closure
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  SessionRequest                              │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  SessionEngine                               │
//! │  ├─ Authenticator::bind                      │
//! │  ├─ temporal::evaluate (per candidate)       │
//! │  ├─ ActivationFilter (role constraints)      │
//! │  └─ separation::check_activation (DSD)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Session                                     │
//! │  - activated roles, in order                 │
//! │  - one warning per skipped role              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use bastion_directory::{DirectoryStore, MemoryAuthenticator, MemoryDirectory};
//! use bastion_hierarchy::HierarchyGraph;
//! use bastion_rbac::{SdCatalog, SessionEngine, SessionRequest};
//! use bastion_types::{GraphKind, Permission, PermissionKey, Role, RoleName, User, UserRole};
//!
//! let directory = Arc::new(MemoryDirectory::new());
//! directory.store_role(Role::new("teller"))?;
//! directory.store_user(User::new("jdoe", "branches"))?;
//! directory.store_user_role(UserRole::new("jdoe", "teller"))?;
//! directory.store_permission(Permission::new("ledger", "read").granted_to_role("teller"))?;
//!
//! let auth = Arc::new(MemoryAuthenticator::new().with_password("jdoe", "secret"));
//! let engine = SessionEngine::new(
//!     directory,
//!     auth,
//!     Arc::new(HierarchyGraph::<RoleName>::new(GraphKind::Role)),
//!     Arc::new(HierarchyGraph::<RoleName>::new(GraphKind::AdminRole)),
//!     Arc::new(SdCatalog::new()),
//! );
//!
//! let mut session = engine.create_session(SessionRequest::password("jdoe", "secret"))?;
//! assert!(engine.check_access(&mut session, &PermissionKey::new("ledger", "read"))?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod activation;
pub mod clock;
mod enforcement;
pub mod permissions;
pub mod separation;
pub mod session;
pub mod temporal;


// Re-export commonly used types
pub use activation::{ActivationFilter, AllowAll, RoleConstraintFilter};
pub use clock::{Clock, FixedClock, SystemClock};
pub use permissions::PermissionSet;
pub use separation::{SdCatalog, SdSnapshot};
pub use session::{SessionEngine, SessionPolicy, SessionRequest};

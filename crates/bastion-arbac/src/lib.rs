//! # bastion-arbac: Delegated administration
//!
//! ARBAC02 checks that let administrators manage part of the role hierarchy
//! without full security-officer privilege.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Admin Session                               │
//! │  (active admin roles)                        │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  DelegatedAuthorizer                         │
//! │  ├─ Expand admin roles through hierarchy     │
//! │  ├─ Role range check (begin .. end)          │
//! │  └─ User / permission org-unit pool check    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - allowed                                   │
//! │  - covering admin role                       │
//! │  - human-readable reason                     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Ranges
//!
//! An admin role with range `[Role2, Role5]` over the chain
//! `Role1 <- Role2 <- Role3 <- Role4 <- Role5 <- Role6` administers
//! `Role3` and `Role4`, plus `Role2` and `Role5` when the matching endpoint
//! is inclusive.
//!
//! ```
//! use bastion_arbac::authorized_range;
//! use bastion_hierarchy::HierarchyGraph;
//! use bastion_types::{AdminRole, GraphKind, RoleName};
//!
//! let roles = HierarchyGraph::<RoleName>::new(GraphKind::Role);
//! for i in 1..6 {
//!     let parent = RoleName::new(format!("Role{}", i + 1));
//!     let child = RoleName::new(format!("Role{i}"));
//!     roles.add_edge(&parent, &child)?;
//! }
//!
//! let admin = AdminRole::new("branch-admin").with_range("Role2", true, "Role5", false);
//! let range = authorized_range(&admin, &roles.snapshot())?;
//!
//! assert!(range.contains(&RoleName::new("Role2")));
//! assert!(range.contains(&RoleName::new("Role4")));
//! assert!(!range.contains(&RoleName::new("Role5")));
//! # Ok::<(), bastion_types::AccessError>(())
//! ```

pub mod authorizer;
pub mod range;


pub use authorizer::{AdminOperation, Decision, DelegatedAuthorizer};
pub use range::{authorized_range, in_pool};

//! # bastion-directory: Collaborator interfaces for `Bastion`
//!
//! The decision engines never own entity data. They reach users, roles,
//! permissions, SD sets and hierarchy edges through a [`DirectoryStore`], and
//! verify credentials through an [`Authenticator`]. Both are injected at
//! construction time.
//!
//! This crate also ships in-memory implementations:
//!
//! - [`MemoryDirectory`]: `RwLock`-guarded maps, optionally backed by a
//!   JSON-lines [`ChangeJournal`] so the directory survives restarts
//! - [`MemoryAuthenticator`]: per-user password state with lockout, expiry,
//!   grace logins and forced change
//!
//! # Example
//!
//! ```
//! use bastion_directory::{DirectoryStore, MemoryDirectory};
//! use bastion_types::{Role, User, UserRole};
//!
//! let directory = MemoryDirectory::new();
//! directory.store_role(Role::new("teller")).unwrap();
//! directory.store_user(User::new("jdoe", "branch-1")).unwrap();
//! directory.store_user_role(UserRole::new("jdoe", "teller")).unwrap();
//!
//! let user = directory.load_user(&"jdoe".into()).unwrap();
//! assert_eq!(user.roles.len(), 1);
//! ```

mod auth;
mod error;
mod journal;
mod memory;
mod store;

#[cfg(test)]
mod tests;

pub use auth::{AuthResult, Authenticator, BindOutcome, MemoryAuthenticator};
pub use error::{DirectoryError, Result};
pub use journal::{ChangeJournal, DirectoryChange, JournalEntry};
pub use memory::MemoryDirectory;
pub use store::DirectoryStore;

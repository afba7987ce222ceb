//! Errors raised while opening a [`Bastion`](crate::Bastion) instance.
//!
//! Operations on an open instance report [`AccessError`] directly.

use bastion_directory::DirectoryError;
use bastion_types::AccessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BastionError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0:#}")]
    Config(#[from] anyhow::Error),

    /// The directory (or its journal) could not be opened.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Stored hierarchy edges or SD sets are inconsistent.
    #[error("invalid stored policy: {0}")]
    Policy(#[from] AccessError),
}

/// Result type for opening an instance.
pub type Result<T> = std::result::Result<T, BastionError>;

use bastion_types::AccessError;

/// Errors reported by directory stores and authenticators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    /// The change journal could not be read or written.
    #[error("change journal error: {0}")]
    JournalError(String),

    /// The store is unreachable or refused the request.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

impl DirectoryError {
    pub fn not_found(entity: &'static str, name: impl std::fmt::Display) -> Self {
        DirectoryError::NotFound {
            entity,
            name: name.to_string(),
        }
    }
}

impl From<DirectoryError> for AccessError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::NotFound { entity, name } => AccessError::NotFound { entity, name },
            other => AccessError::BackingStore(other.to_string()),
        }
    }
}

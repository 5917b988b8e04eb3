use thiserror::Error;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum DbError {
    /// A required field was missing or a uniqueness rule was broken.
    #[error("{0}")]
    Validation(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("record vanished after insert: {0}")]
    Missing(&'static str),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Turn a UNIQUE constraint failure on `users` into a validation error the
/// forms can show; everything else passes through untouched.
pub(crate) fn map_unique_violation(err: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return DbError::validation("Username already taken");
            }
            if msg.contains("users.email") {
                return DbError::validation("Email already taken");
            }
        }
    }
    DbError::Sqlite(err)
}

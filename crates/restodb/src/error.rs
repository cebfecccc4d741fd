//! Error types for restodb

use thiserror::Error;

/// Result type alias for restodb operations
pub type OrmResult<T> = Result<T, OrmError>;

/// SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for foreign key violations.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for check constraint violations.
pub const CHECK_VIOLATION: &str = "23514";

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver-level failure without a server error (closed connection, bind failure, ...)
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Error reported by the server, with its SQLSTATE code
    #[error("{message}")]
    Database {
        code: String,
        message: String,
        constraint: Option<String>,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a server error from a SQLSTATE code and message.
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            code: code.into(),
            message: message.into(),
            constraint: None,
        }
    }

    /// SQLSTATE code, when the server reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        self.code() == Some(FOREIGN_KEY_VIOLATION)
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Parse a tokio_postgres error, keeping the server's SQLSTATE code when present.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            return Self::Database {
                code: db_err.code().code().to_string(),
                message: db_err.message().to_string(),
                constraint: db_err.constraint().map(str::to_string),
            };
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_exposes_code() {
        let err = OrmError::database(UNIQUE_VIOLATION, "duplicate key value");
        assert_eq!(err.code(), Some("23505"));
        assert!(err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
        assert_eq!(err.to_string(), "duplicate key value");
    }

    #[test]
    fn non_database_errors_have_no_code() {
        assert_eq!(OrmError::not_found("gone").code(), None);
        assert_eq!(OrmError::validation("bad").code(), None);
        assert!(OrmError::not_found("gone").is_not_found());
    }
}

//! Database-specific error types and conversions.

use idgate_core::error::IdgateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed row: {0}")]
    InvalidRow(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },
}

impl DbError {
    /// Classify a failed statement, separating unique-key violations from
    /// every other failure.
    pub(crate) fn from_statement(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        if is_unique_violation(&message) {
            DbError::Conflict {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

/// SurrealDB reports duplicate record ids and UNIQUE index hits only
/// through the error text.
fn is_unique_violation(message: &str) -> bool {
    message.contains("already exists") || message.contains("already contains")
}

impl From<DbError> for IdgateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => IdgateError::NotFound { entity, id },
            DbError::Conflict { entity } => IdgateError::AlreadyExists { entity },
            other => IdgateError::Database(other.to_string()),
        }
    }
}

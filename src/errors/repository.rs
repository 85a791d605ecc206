use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(SqlxError),

    /// No invite matched the lookup key
    #[error("Invite not found: {0}")]
    NotFound(String),

    /// Unique index on `code` or `token` violated
    #[error("Conflict error: {0}")]
    Conflict(String),

    /// Row could not be written or mapped
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => Self::NotFound("Invite not found".to_string()),
            SqlxError::Database(db_err) => {
                // PostgreSQL error codes for common constraints
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        // Unique violation
                        "23505" => {
                            let constraint = db_err.constraint().unwrap_or("unique index");
                            return Self::Conflict(format!("Duplicate value violates {}", constraint));
                        }
                        // Not-null violation
                        "23502" => {
                            return Self::InvalidData("Invite is missing a required column".to_string())
                        }
                        // Check constraint violation
                        "23514" => {
                            return Self::InvalidData("Data violates constraints".to_string())
                        }
                        _ => {}
                    }
                }
                Self::Database(SqlxError::Database(db_err))
            }
            SqlxError::ColumnDecode { .. } | SqlxError::ColumnNotFound(_) => {
                Self::InvalidData(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

use std::io::Error as IoError;

use thiserror::Error;

pub mod api;
pub mod config;
pub mod repository;

pub use api::ApiError;
pub use config::ConfigError;
pub use repository::RepositoryError;

use crate::db::DatabaseError;

/// Infrastructure failures that stop the process
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Server error: {0}")]
    Server(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logger error: {0}")]
    Logger(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        AppError::Database(e.to_string())
    }
}

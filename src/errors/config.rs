use std::env::VarError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Represents an error related to environment variables.
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] VarError),

    /// Represents an error related to parsing configuration data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A setting required by the selected mode is not set.
    #[error("Missing setting: {0}")]
    Missing(String),

    /// Loaded values failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

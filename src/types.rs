use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{db::DatabaseHealth, errors::ApiError};

// Result type for request handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize)]
pub struct ResponsePayload {
    pub status: i32,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db_health: Option<DatabaseHealth>,
    pub uptime_seconds: u64,
}

// Define an AppState struct to hold shared application state
pub struct AppState {
    pub start_time: Instant,
    pub version: String,
}

impl AppState {
    pub fn new(version: String) -> Self {
        Self {
            start_time: Instant::now(),
            version,
        }
    }
}

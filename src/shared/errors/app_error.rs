use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {message}{}", retry_hint(.retry_after))]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed game: {0}")]
    MalformedGame(String),

    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: String,
        to: String,
    },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    }
}

impl AppError {
    /// Transient failures are retried by the worker with backoff; everything
    /// else fails the job immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. }
                | AppError::UpstreamUnavailable(_)
                | AppError::EngineFailure(_)
                | AppError::PersistenceFailure(_)
        )
    }

    /// Server-provided delay hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Stable tag used in persisted error details and log lines
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::ApiError(_) => "api_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MalformedGame(_) => "malformed_game",
            AppError::EngineFailure(_) => "engine_failure",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::PersistenceFailure(_) => "persistence_failure",
            AppError::SerializationError(_) => "serialization_error",
            AppError::ConfigError(_) => "config_error",
            AppError::NotificationError(_) => "notification_error",
            AppError::Cancelled(_) => "cancelled",
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                AppError::NotFound("Record not found in database".to_string())
            }
            _ => AppError::PersistenceFailure(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::PersistenceFailure(format!("Database pool error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamUnavailable("Request timeout".to_string())
        } else if err.is_connect() {
            AppError::UpstreamUnavailable("Failed to connect to external service".to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => AppError::RateLimited {
                    message: "Too many requests".to_string(),
                    retry_after: None,
                },
                404 | 410 => AppError::NotFound("External resource not found".to_string()),
                500..=599 => AppError::UpstreamUnavailable(format!("HTTP {}", status)),
                _ => AppError::ApiError(format!("HTTP {}: {}", status, err)),
            }
        } else if err.is_decode() {
            AppError::SerializationError(err.to_string())
        } else {
            AppError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::EngineFailure(format!("I/O error: {}", err))
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

use thiserror::Error;

use crate::types::Platform;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{platform} unavailable: {reason}")]
    ProviderUnavailable { platform: Platform, reason: String },

    #[error("No platform returned data: {0}")]
    AllProvidersUnavailable(String),

    #[error("State file corrupt: {0}")]
    StateCorrupt(String),

    #[error("Notification error: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn provider(platform: Platform, reason: impl Into<String>) -> Self {
        AppError::ProviderUnavailable {
            platform,
            reason: reason.into(),
        }
    }
}

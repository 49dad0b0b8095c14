//! Error types for the liquidity collision agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, CollisionError>;

#[derive(Error, Debug)]
pub enum CollisionError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error("missing org_id")]
    MissingOrgId,

    #[error("Insufficient historical data: {days} days (required {required})")]
    InsufficientHistory { days: usize, required: usize },

    #[error("No payments returned for org {0}")]
    NoPaymentHistory(String),

    #[error("Backend error on {endpoint}: {message}")]
    Backend { endpoint: String, message: String },

    #[error("Model training error: {0}")]
    ModelTraining(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl CollisionError {
    pub fn backend(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

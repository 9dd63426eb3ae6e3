use thiserror::Error;

/// Application-wide error types for textlens.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page or reading a response).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Classification API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Reading or writing the on-disk cache failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The classifier response contained no parseable JSON record.
    #[error("JSON record not found in response")]
    RecordNotFound,
}

impl AppError {
    /// Returns true if repeating the same request cannot succeed.
    ///
    /// Client errors other than throttling and request timeouts (bad key,
    /// unknown model, rejected payload) and configuration errors.
    pub fn is_permanent(&self) -> bool {
        match self {
            AppError::ConfigError(_) => true,
            AppError::LlmError {
                status_code,
                retryable,
                ..
            } => {
                !*retryable
                    && (400..500).contains(status_code)
                    && ![408, 429].contains(status_code)
            }
            _ => false,
        }
    }
}

use thiserror::Error;

/// Application-wide error types for WebMon.
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch got a non-2xx HTTP response.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Fetch exceeded its deadline.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection or DNS failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// URL failed to parse, or was rejected before fetching.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Fetched content could not be used as an HTML document.
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// XPath expression is syntactically invalid or outside the supported subset.
    #[error("Invalid XPath expression: {0}")]
    InvalidXPath(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Domain-level validation failed (blank field, non-positive period).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error came from the check itself (fetch or
    /// extract) rather than from infrastructure. Check failures reschedule
    /// the watch normally; they are never fatal.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            AppError::HttpStatus(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::InvalidUrl(_)
                | AppError::MalformedContent(_)
                | AppError::InvalidXPath(_)
        )
    }
}

//! Error types for assistant operations

use thiserror::Error;

/// Result type for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

/// Errors that can occur while talking to the assistant service.
///
/// These are transport and protocol failures. A job that runs and then ends
/// badly is not an error; it is reported through [`crate::JobOutcome`].
#[derive(Error, Debug)]
pub enum AssistantError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Thread, run, or assistant not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AssistantError::NotFound("thread_1".to_string());
        assert_eq!(err.to_string(), "Not found: thread_1");

        let err = AssistantError::AuthenticationFailed;
        assert_eq!(err.to_string(), "Invalid API key or authentication failed");
    }
}

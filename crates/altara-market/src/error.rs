//! Error types for market data operations

use thiserror::Error;

/// Market data and analysis errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Invalid ticker symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Provider answered with an error status or error body
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Provider payload did not have the expected shape
    #[error("Unexpected {provider} payload: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    /// Provider returned no data for the symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: &'static str },

    /// Credential required by a provider is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Assistant service error
    #[error("Assistant error: {0}")]
    AssistantError(#[from] altara_assistant::AssistantError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::InvalidSymbol("12$".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: 12$");

        let err = MarketError::DataUnavailable {
            symbol: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");

        let err = MarketError::Provider {
            provider: "NewsAPI",
            message: "apiKeyInvalid".to_string(),
        };
        assert_eq!(err.to_string(), "NewsAPI error: apiKeyInvalid");
    }

    #[test]
    fn test_error_conversion() {
        let assistant_err = altara_assistant::AssistantError::AuthenticationFailed;
        let err: MarketError = assistant_err.into();
        assert!(matches!(err, MarketError::AssistantError(_)));
    }
}

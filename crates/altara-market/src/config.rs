//! Configuration for market analysis

use crate::error::{MarketError, Result};
use crate::signals::ForecastMethod;
use altara_assistant::PollPolicy;
use altara_utils::Credentials;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const NEWS_API_BASE_URL: &str = "https://newsapi.org/v2";

/// Configuration for market analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Calendar days of price history to fetch
    pub history_days: u32,

    /// Moving average windows, in observations
    pub ma_windows: Vec<usize>,

    /// Window (observations) of the headline percent change
    pub pct_change_window: usize,

    /// Calendar days to forecast past the last close
    pub forecast_days: usize,

    /// Trend model used for the forecast panel
    pub forecast_method: ForecastMethod,

    /// Maximum headlines carried into the prompt
    pub headline_limit: usize,

    /// NewsAPI `language` parameter
    pub news_language: String,

    /// NewsAPI `sortBy` parameter
    pub news_sort_by: String,

    /// TTL of cached price histories
    pub cache_ttl: Duration,

    /// Finnhub requests per minute
    pub finnhub_rate_limit: u32,

    /// NewsAPI requests per minute
    pub news_rate_limit: u32,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Delay between assistant status checks
    pub poll_interval: Duration,

    /// Maximum assistant status checks per job
    pub max_poll_attempts: u32,

    /// Wall-clock limit for one assistant job
    pub job_deadline: Duration,

    /// Finnhub API key (optional)
    pub finnhub_api_key: Option<String>,

    /// NewsAPI key (optional)
    pub news_api_key: Option<String>,

    /// Assistant identifier (optional)
    pub assistant_id: Option<String>,

    pub finnhub_base_url: String,

    pub news_api_base_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            history_days: 180,
            ma_windows: vec![7, 30],
            pct_change_window: 7,
            forecast_days: 30,
            forecast_method: ForecastMethod::Linear,
            headline_limit: 5,
            news_language: "en".to_string(),
            news_sort_by: "publishedAt".to_string(),
            cache_ttl: Duration::from_secs(60),
            finnhub_rate_limit: 60,
            news_rate_limit: 30,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 120,
            job_deadline: Duration::from_secs(180),
            finnhub_api_key: None,
            news_api_key: None,
            assistant_id: None,
            finnhub_base_url: FINNHUB_BASE_URL.to_string(),
            news_api_base_url: NEWS_API_BASE_URL.to_string(),
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ma_windows.is_empty() || self.ma_windows.contains(&0) {
            return Err(MarketError::ConfigError(
                "ma_windows must be non-empty and positive".to_string(),
            ));
        }

        if self.pct_change_window < 2 {
            return Err(MarketError::ConfigError(
                "pct_change_window must be at least 2".to_string(),
            ));
        }

        if self.history_days == 0 {
            return Err(MarketError::ConfigError(
                "history_days must be greater than 0".to_string(),
            ));
        }

        if self.max_poll_attempts == 0 || self.poll_interval.is_zero() {
            return Err(MarketError::ConfigError(
                "poll interval and attempt budget must be greater than 0".to_string(),
            ));
        }

        if let ForecastMethod::Holt { alpha, beta } = self.forecast_method {
            if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
                return Err(MarketError::ConfigError(
                    "Holt smoothing factors must lie in [0, 1]".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Assistant poll budget derived from this configuration
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.max_poll_attempts, self.job_deadline)
    }
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    history_days: Option<u32>,
    ma_windows: Option<Vec<usize>>,
    pct_change_window: Option<usize>,
    forecast_days: Option<usize>,
    forecast_method: Option<ForecastMethod>,
    headline_limit: Option<usize>,
    cache_ttl: Option<Duration>,
    request_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    max_poll_attempts: Option<u32>,
    job_deadline: Option<Duration>,
    finnhub_api_key: Option<String>,
    news_api_key: Option<String>,
    assistant_id: Option<String>,
    finnhub_base_url: Option<String>,
    news_api_base_url: Option<String>,
}

impl MarketConfigBuilder {
    /// Set calendar days of price history
    pub fn history_days(mut self, days: u32) -> Self {
        self.history_days = Some(days);
        self
    }

    /// Set moving average windows
    pub fn ma_windows(mut self, windows: Vec<usize>) -> Self {
        self.ma_windows = Some(windows);
        self
    }

    /// Set the percent change window
    pub fn pct_change_window(mut self, window: usize) -> Self {
        self.pct_change_window = Some(window);
        self
    }

    /// Set the forecast horizon in days
    pub fn forecast_days(mut self, days: usize) -> Self {
        self.forecast_days = Some(days);
        self
    }

    /// Set the forecast model
    pub fn forecast_method(mut self, method: ForecastMethod) -> Self {
        self.forecast_method = Some(method);
        self
    }

    /// Set the headline limit
    pub fn headline_limit(mut self, limit: usize) -> Self {
        self.headline_limit = Some(limit);
        self
    }

    /// Set cache TTL for price histories
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the assistant poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the maximum assistant status checks
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    /// Set the assistant job deadline
    pub fn job_deadline(mut self, deadline: Duration) -> Self {
        self.job_deadline = Some(deadline);
        self
    }

    /// Set Finnhub API key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Set NewsAPI key
    pub fn news_api_key(mut self, key: impl Into<String>) -> Self {
        self.news_api_key = Some(key.into());
        self
    }

    /// Set the assistant identifier
    pub fn assistant_id(mut self, id: impl Into<String>) -> Self {
        self.assistant_id = Some(id.into());
        self
    }

    /// Override the Finnhub base URL
    pub fn finnhub_base_url(mut self, url: impl Into<String>) -> Self {
        self.finnhub_base_url = Some(url.into());
        self
    }

    /// Override the NewsAPI base URL
    pub fn news_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.news_api_base_url = Some(url.into());
        self
    }

    /// Take API keys and the assistant id from loaded credentials
    pub fn credentials(mut self, credentials: &Credentials) -> Self {
        if let Some(key) = &credentials.finnhub_api_key {
            self.finnhub_api_key = Some(key.clone());
        }
        if let Some(key) = &credentials.news_api_key {
            self.news_api_key = Some(key.clone());
        }
        if let Some(id) = &credentials.assistant_id {
            self.assistant_id = Some(id.clone());
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            history_days: self.history_days.unwrap_or(defaults.history_days),
            ma_windows: self.ma_windows.unwrap_or(defaults.ma_windows),
            pct_change_window: self.pct_change_window.unwrap_or(defaults.pct_change_window),
            forecast_days: self.forecast_days.unwrap_or(defaults.forecast_days),
            forecast_method: self.forecast_method.unwrap_or(defaults.forecast_method),
            headline_limit: self.headline_limit.unwrap_or(defaults.headline_limit),
            news_language: defaults.news_language,
            news_sort_by: defaults.news_sort_by,
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            finnhub_rate_limit: defaults.finnhub_rate_limit,
            news_rate_limit: defaults.news_rate_limit,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            max_poll_attempts: self.max_poll_attempts.unwrap_or(defaults.max_poll_attempts),
            job_deadline: self.job_deadline.unwrap_or(defaults.job_deadline),
            finnhub_api_key: self.finnhub_api_key,
            news_api_key: self.news_api_key,
            assistant_id: self.assistant_id,
            finnhub_base_url: self.finnhub_base_url.unwrap_or(defaults.finnhub_base_url),
            news_api_base_url: self.news_api_base_url.unwrap_or(defaults.news_api_base_url),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.ma_windows, vec![7, 30]);
        assert_eq!(config.pct_change_window, 7);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MarketConfig::builder()
            .forecast_days(14)
            .forecast_method(ForecastMethod::holt())
            .max_poll_attempts(10)
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.forecast_days, 14);
        assert_eq!(config.max_poll_attempts, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(matches!(config.forecast_method, ForecastMethod::Holt { .. }));
    }

    #[test]
    fn test_builder_takes_credentials() {
        let credentials = Credentials {
            finnhub_api_key: Some("fh".to_string()),
            assistant_id: Some("asst_1".to_string()),
            ..Default::default()
        };
        let config = MarketConfig::builder()
            .credentials(&credentials)
            .build()
            .unwrap();
        assert_eq!(config.finnhub_api_key.as_deref(), Some("fh"));
        assert_eq!(config.assistant_id.as_deref(), Some("asst_1"));
        assert!(config.news_api_key.is_none());
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let result = MarketConfig::builder().ma_windows(vec![7, 0]).build();
        assert!(matches!(result, Err(MarketError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_short_pct_window() {
        let config = MarketConfig {
            pct_change_window: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_holt_factors() {
        let config = MarketConfig {
            forecast_method: ForecastMethod::Holt {
                alpha: 1.5,
                beta: 0.1,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_policy() {
        let config = MarketConfig::builder()
            .poll_interval(Duration::from_millis(250))
            .max_poll_attempts(8)
            .job_deadline(Duration::from_secs(10))
            .build()
            .unwrap();
        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(250));
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.deadline, Duration::from_secs(10));
    }
}

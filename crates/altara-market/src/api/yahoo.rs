//! Yahoo Finance price history client

use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::model::{PriceBar, PriceSeries};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;
use yahoo_finance_api as yahoo;

/// Yahoo Finance API client
#[derive(Clone)]
pub struct YahooFinanceClient {
    connector: Arc<yahoo::YahooConnector>,
    timeout: std::time::Duration,
}

impl std::fmt::Debug for YahooFinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooFinanceClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn provider_error(e: impl std::fmt::Display) -> MarketError {
    MarketError::YahooFinanceError(e.to_string())
}

fn to_bar(quote: &yahoo::Quote) -> PriceBar {
    PriceBar {
        timestamp: DateTime::from_timestamp(quote.timestamp as i64, 0).unwrap_or_else(Utc::now),
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
    }
}

impl YahooFinanceClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let connector = yahoo::YahooConnector::builder()
            .timeout(timeout)
            .build()
            .map_err(provider_error)?;
        Ok(Self {
            connector: Arc::new(connector),
            timeout,
        })
    }

    /// Build from configuration, using the configured request timeout
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Self::new(config.request_timeout)
    }

    pub fn timeout(&self) -> std::time::Duration {
        self.timeout
    }

    /// Daily bars covering the last `days` calendar days
    #[instrument(skip(self))]
    pub async fn price_history(&self, symbol: &str, days: u32) -> Result<PriceSeries> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));
        self.price_history_between(symbol, start, end).await
    }

    /// Daily bars between two instants
    pub async fn price_history_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| provider_error(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| provider_error(format!("Invalid end timestamp: {e}")))?;

        let response = self
            .connector
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(provider_error)?;
        let quotes = response.quotes().map_err(provider_error)?;

        let series = PriceSeries::new(symbol, quotes.iter().map(to_bar).collect());
        tracing::debug!(symbol, bars = series.len(), "fetched price history");

        if series.is_empty() {
            return Err(MarketError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no price bars returned".to_string(),
            });
        }
        Ok(series)
    }

    /// The most recent daily bar
    #[instrument(skip(self))]
    pub async fn latest_bar(&self, symbol: &str) -> Result<PriceBar> {
        let response = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(provider_error)?;
        let quote = response.last_quote().map_err(provider_error)?;

        let bar = to_bar(&quote);
        if !bar.close.is_finite() {
            return Err(MarketError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "latest close is not a number".to_string(),
            });
        }
        Ok(bar)
    }
}

//! Data source seams used by the pipeline and the market overview
//!
//! Each trait returns a typed `Result`; callers decide how a failure
//! degrades. The concrete implementations wrap the API clients in `api`.

use crate::api::{FinnhubClient, NewsApiClient, SectorPerformance, YahooFinanceClient};
use crate::cache::{CacheKey, MarketCache};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::model::{AnalystRatings, Fundamentals, InsiderSummary, PriceBar, PriceSeries};
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Price bars and descriptive quote fields
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Daily bars covering the last `days` calendar days
    async fn price_history(&self, ticker: &Ticker, days: u32) -> Result<PriceSeries>;

    /// Most recent daily bar
    async fn latest_bar(&self, ticker: &Ticker) -> Result<PriceBar>;

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals>;
}

/// Recent headlines for a free-text query
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// At most `limit` titles, most recent first
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Analyst, insider, and sentiment facts for a ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn analyst_ratings(&self, ticker: &Ticker) -> Result<AnalystRatings>;

    async fn insider_summary(&self, ticker: &Ticker) -> Result<InsiderSummary>;

    /// News sentiment in [0, 1]
    async fn news_sentiment(&self, ticker: &Ticker) -> Result<f64>;
}

/// Market-wide news and sector data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// General market headlines, most recent first
    async fn market_headlines(&self) -> Result<Vec<String>>;

    async fn sector_performance(&self) -> Result<Vec<SectorPerformance>>;
}

/// Yahoo price history plus Finnhub basic financials, with cached histories
#[derive(Debug, Clone)]
pub struct QuoteFetcher {
    yahoo: YahooFinanceClient,
    finnhub: Option<FinnhubClient>,
    cache: MarketCache<PriceSeries>,
}

impl QuoteFetcher {
    /// Price histories are cached for `cache_ttl`
    pub fn new(yahoo: YahooFinanceClient, cache_ttl: std::time::Duration) -> Self {
        Self {
            yahoo,
            finnhub: None,
            cache: MarketCache::new(cache_ttl),
        }
    }

    /// Use an explicit Finnhub client for basic financials
    pub fn with_finnhub(mut self, client: FinnhubClient) -> Self {
        self.finnhub = Some(client);
        self
    }
}

#[async_trait]
impl QuoteSource for QuoteFetcher {
    async fn price_history(&self, ticker: &Ticker, days: u32) -> Result<PriceSeries> {
        let key = CacheKey::new(ticker.as_str(), "history", days);
        self.cache
            .get_or_fetch(key, || self.yahoo.price_history(ticker.as_str(), days))
            .await
    }

    async fn latest_bar(&self, ticker: &Ticker) -> Result<PriceBar> {
        self.yahoo.latest_bar(ticker.as_str()).await
    }

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let symbol = ticker.as_str();
        let metric = async {
            match &self.finnhub {
                Some(client) => Some(client.basic_financials(symbol).await),
                None => None,
            }
        };
        let (bar, metric) = tokio::join!(self.yahoo.latest_bar(symbol), metric);

        let mut fundamentals = Fundamentals::default();
        let quote_error = match bar {
            Ok(bar) => {
                fundamentals.current_price = Some(bar.close);
                fundamentals.volume = Some(bar.volume);
                None
            }
            Err(e) => Some(e),
        };

        match metric {
            Some(Ok(metric)) => metric.apply_to(&mut fundamentals),
            Some(Err(e)) => {
                tracing::warn!(symbol, error = %e, "basic financials unavailable");
                if let Some(quote_error) = quote_error {
                    return Err(quote_error);
                }
            }
            None => {
                if let Some(quote_error) = quote_error {
                    return Err(quote_error);
                }
            }
        }

        Ok(fundamentals)
    }
}

#[async_trait]
impl HeadlineSource for NewsApiClient {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        NewsApiClient::headlines(self, query, limit).await
    }
}

/// Company news of the last week, used when no NewsAPI key is configured
#[async_trait]
impl HeadlineSource for FinnhubClient {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let ticker = Ticker::parse(query)?;
        let to = Utc::now().date_naive();
        let from = to - Duration::days(7);
        let articles = self
            .company_news(ticker.as_str(), &from.to_string(), &to.to_string())
            .await?;

        Ok(articles
            .into_iter()
            .map(|a| a.headline)
            .filter(|h| !h.trim().is_empty())
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl ContextSource for FinnhubClient {
    async fn analyst_ratings(&self, ticker: &Ticker) -> Result<AnalystRatings> {
        self.recommendation_trends(ticker.as_str()).await
    }

    async fn insider_summary(&self, ticker: &Ticker) -> Result<InsiderSummary> {
        self.insider_transactions(ticker.as_str()).await
    }

    async fn news_sentiment(&self, ticker: &Ticker) -> Result<f64> {
        FinnhubClient::news_sentiment(self, ticker.as_str()).await
    }
}

#[async_trait]
impl MarketFeed for FinnhubClient {
    async fn market_headlines(&self) -> Result<Vec<String>> {
        Ok(self
            .market_news("general")
            .await?
            .into_iter()
            .map(|a| a.headline)
            .collect())
    }

    async fn sector_performance(&self) -> Result<Vec<SectorPerformance>> {
        FinnhubClient::sector_performance(self).await
    }
}

/// A source that is not configured; every call fails with `MissingCredential`
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl HeadlineSource for Unconfigured {
    async fn headlines(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        Err(MarketError::MissingCredential(self.0))
    }
}

#[async_trait]
impl ContextSource for Unconfigured {
    async fn analyst_ratings(&self, _ticker: &Ticker) -> Result<AnalystRatings> {
        Err(MarketError::MissingCredential(self.0))
    }

    async fn insider_summary(&self, _ticker: &Ticker) -> Result<InsiderSummary> {
        Err(MarketError::MissingCredential(self.0))
    }

    async fn news_sentiment(&self, _ticker: &Ticker) -> Result<f64> {
        Err(MarketError::MissingCredential(self.0))
    }
}

#[async_trait]
impl MarketFeed for Unconfigured {
    async fn market_headlines(&self) -> Result<Vec<String>> {
        Err(MarketError::MissingCredential(self.0))
    }

    async fn sector_performance(&self) -> Result<Vec<SectorPerformance>> {
        Err(MarketError::MissingCredential(self.0))
    }
}

/// Provider clients built once from configuration.
///
/// Every role handed out shares these clients, so one provider's rate limit
/// and the history cache are shared by everything that uses it.
#[derive(Debug, Clone)]
pub struct ProviderClients {
    quotes: QuoteFetcher,
    finnhub: Option<FinnhubClient>,
    news_api: Option<NewsApiClient>,
}

impl ProviderClients {
    /// Build the clients whose credentials are configured
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let finnhub = config
            .finnhub_api_key
            .is_some()
            .then(|| FinnhubClient::from_config(config))
            .transpose()?;
        let news_api = config
            .news_api_key
            .is_some()
            .then(|| NewsApiClient::from_config(config))
            .transpose()?;

        let mut quotes = QuoteFetcher::new(YahooFinanceClient::from_config(config)?, config.cache_ttl);
        match &finnhub {
            Some(client) => quotes = quotes.with_finnhub(client.clone()),
            None => tracing::debug!("fundamentals limited to Yahoo fields"),
        }

        Ok(Self {
            quotes,
            finnhub,
            news_api,
        })
    }

    /// Yahoo bars and Finnhub basic financials
    pub fn quotes(&self) -> Arc<dyn QuoteSource> {
        Arc::new(self.quotes.clone())
    }

    /// NewsAPI when its key is configured, else Finnhub company news
    pub fn headlines(&self) -> Arc<dyn HeadlineSource> {
        if let Some(client) = &self.news_api {
            return Arc::new(client.clone());
        }
        if let Some(client) = &self.finnhub {
            tracing::info!("NEWS_API_KEY not set, using Finnhub company news for headlines");
            return Arc::new(client.clone());
        }
        Arc::new(Unconfigured("NEWS_API_KEY"))
    }

    /// Finnhub analyst, insider, and sentiment data
    pub fn context(&self) -> Arc<dyn ContextSource> {
        match &self.finnhub {
            Some(client) => Arc::new(client.clone()),
            None => Arc::new(Unconfigured("FINNHUB_API_KEY")),
        }
    }

    /// Finnhub market news and sector performance
    pub fn market_feed(&self) -> Arc<dyn MarketFeed> {
        match &self.finnhub {
            Some(client) => Arc::new(client.clone()),
            None => Arc::new(Unconfigured("FINNHUB_API_KEY")),
        }
    }
}

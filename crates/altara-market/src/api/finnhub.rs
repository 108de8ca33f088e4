//! Finnhub client for analyst, insider, sentiment, and market news data

use super::{SharedRateLimiter, decode, http_client, lenient_f64, rate_limiter, read_json};
use crate::config::{FINNHUB_BASE_URL, MarketConfig};
use crate::error::{MarketError, Result};
use crate::model::{AnalystRatings, Fundamentals, InsiderActivity, InsiderSummary};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

const PROVIDER: &str = "Finnhub";

/// Finnhub news article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinnhubNewsArticle {
    /// Article category
    pub category: String,
    /// Publish time (UNIX timestamp)
    pub datetime: i64,
    /// News headline
    pub headline: String,
    /// Unique article ID
    pub id: i64,
    /// Related symbols
    pub related: String,
    /// News source
    pub source: String,
    /// Article summary
    pub summary: String,
    /// Article URL
    pub url: String,
}

/// One period of `/stock/recommendation`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecommendationTrend {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

impl From<RecommendationTrend> for AnalystRatings {
    fn from(trend: RecommendationTrend) -> Self {
        Self {
            period: trend.period,
            strong_buy: trend.strong_buy,
            buy: trend.buy,
            hold: trend.hold,
            sell: trend.sell,
            strong_sell: trend.strong_sell,
        }
    }
}

/// One record of `/stock/insider-transactions`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsiderTransaction {
    pub name: String,
    /// Signed share change of the transaction
    pub change: i64,
    pub transaction_code: String,
    pub transaction_date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InsiderTransactionsResponse {
    data: Vec<InsiderTransaction>,
}

/// `/news-sentiment` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsSentiment {
    /// Overall news score in [0, 1]
    #[serde(deserialize_with = "lenient_f64")]
    pub company_news_score: Option<f64>,
}

/// Selected fields of `/stock/metric?metric=all`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicFinancials {
    #[serde(rename = "52WeekHigh", deserialize_with = "lenient_f64")]
    pub week_52_high: Option<f64>,
    #[serde(rename = "52WeekLow", deserialize_with = "lenient_f64")]
    pub week_52_low: Option<f64>,
    /// Millions of USD
    #[serde(rename = "marketCapitalization", deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(rename = "peTTM", deserialize_with = "lenient_f64")]
    pub pe_ttm: Option<f64>,
    #[serde(rename = "peBasicExclExtraTTM", deserialize_with = "lenient_f64")]
    pub pe_basic_excl_extra_ttm: Option<f64>,
}

impl BasicFinancials {
    /// Merge into quote fundamentals, leaving price and volume untouched
    pub fn apply_to(&self, fundamentals: &mut Fundamentals) {
        fundamentals.week_52_high = self.week_52_high;
        fundamentals.week_52_low = self.week_52_low;
        fundamentals.market_cap = self.market_cap;
        fundamentals.pe_ratio = self.pe_ttm.or(self.pe_basic_excl_extra_ttm);
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetricResponse {
    metric: BasicFinancials,
}

/// One row of `/stock/sector-performance`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub sector: String,
    /// Percent change
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change: Option<f64>,
}

/// Finnhub REST client with rate limiting
#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl std::fmt::Debug for FinnhubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinnhubClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

impl FinnhubClient {
    /// Create a new Finnhub client with rate limiting
    ///
    /// # Arguments
    /// * `api_key` - Finnhub API key
    /// * `rate_limit` - Requests per minute (free tier: 60, premium: 300+)
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: FINNHUB_BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit),
        })
    }

    /// Build from configuration; fails when no Finnhub key is configured
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let key = config
            .finnhub_api_key
            .as_deref()
            .ok_or(MarketError::MissingCredential("FINNHUB_API_KEY"))?;
        Ok(Self::new(key, config.finnhub_rate_limit, config.request_timeout)?
            .with_base_url(&config.finnhub_base_url))
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Take a permit without waiting
    #[cfg(test)]
    pub(crate) fn try_acquire_permit(&self) -> bool {
        self.rate_limiter.check().is_ok()
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "finnhub request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        let body = read_json(response, PROVIDER).await?;
        check_error_body(&body)?;
        Ok(body)
    }

    /// Most recent analyst recommendation counts
    #[instrument(skip(self))]
    pub async fn recommendation_trends(&self, symbol: &str) -> Result<AnalystRatings> {
        let body = self.get("/stock/recommendation", &[("symbol", symbol)]).await?;
        parse_recommendations(symbol, body)
    }

    /// Open-market insider purchases and sales
    #[instrument(skip(self))]
    pub async fn insider_transactions(&self, symbol: &str) -> Result<InsiderSummary> {
        let body = self
            .get("/stock/insider-transactions", &[("symbol", symbol)])
            .await?;
        parse_insider_transactions(body)
    }

    /// Company news score in [0, 1]
    #[instrument(skip(self))]
    pub async fn news_sentiment(&self, symbol: &str) -> Result<f64> {
        let body = self.get("/news-sentiment", &[("symbol", symbol)]).await?;
        parse_news_sentiment(symbol, body)
    }

    /// 52-week range, market cap, and P/E
    #[instrument(skip(self))]
    pub async fn basic_financials(&self, symbol: &str) -> Result<BasicFinancials> {
        let body = self
            .get("/stock/metric", &[("symbol", symbol), ("metric", "all")])
            .await?;
        Ok(decode::<MetricResponse>(body, PROVIDER)?.metric)
    }

    /// Company news between two dates (YYYY-MM-DD), most recent first
    #[instrument(skip(self))]
    pub async fn company_news(
        &self,
        symbol: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<FinnhubNewsArticle>> {
        let body = self
            .get(
                "/company-news",
                &[("symbol", symbol), ("from", from), ("to", to)],
            )
            .await?;
        let mut articles: Vec<FinnhubNewsArticle> = decode(body, PROVIDER)?;
        articles.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        Ok(articles)
    }

    /// General market news
    ///
    /// # Arguments
    /// * `category` - News category (general, forex, crypto, merger)
    #[instrument(skip(self))]
    pub async fn market_news(&self, category: &str) -> Result<Vec<FinnhubNewsArticle>> {
        let body = self.get("/news", &[("category", category)]).await?;
        decode(body, PROVIDER)
    }

    /// Percent change per market sector
    #[instrument(skip(self))]
    pub async fn sector_performance(&self) -> Result<Vec<SectorPerformance>> {
        let body = self.get("/stock/sector-performance", &[]).await?;
        decode(body, PROVIDER)
    }
}

/// Finnhub reports some failures as `{"error": "..."}` with a 200 status
fn check_error_body(body: &serde_json::Value) -> Result<()> {
    match body.get("error").and_then(|e| e.as_str()) {
        Some(message) => Err(MarketError::Provider {
            provider: PROVIDER,
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_recommendations(symbol: &str, body: serde_json::Value) -> Result<AnalystRatings> {
    let trends: Vec<RecommendationTrend> = decode(body, PROVIDER)?;
    trends
        .into_iter()
        .max_by(|a, b| a.period.cmp(&b.period))
        .map(AnalystRatings::from)
        .ok_or_else(|| MarketError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no analyst recommendations".to_string(),
        })
}

fn parse_insider_transactions(body: serde_json::Value) -> Result<InsiderSummary> {
    let response: InsiderTransactionsResponse = decode(body, PROVIDER)?;
    Ok(InsiderSummary::from_records(response.data.iter().filter_map(
        |t| InsiderActivity::from_code(&t.transaction_code).map(|activity| (activity, t.change)),
    )))
}

fn parse_news_sentiment(symbol: &str, body: serde_json::Value) -> Result<f64> {
    let sentiment: NewsSentiment = decode(body, PROVIDER)?;
    sentiment
        .company_news_score
        .ok_or_else(|| MarketError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no news sentiment score".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finnhub_client_creation() {
        let client = FinnhubClient::new("test_key", 60, Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9000/api/v1/");
        assert_eq!(client.api_key, "test_key");
        assert_eq!(client.base_url, "http://localhost:9000/api/v1");
        assert!(!format!("{client:?}").contains("test_key"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = FinnhubClient::from_config(&MarketConfig::default()).unwrap_err();
        assert!(matches!(err, MarketError::MissingCredential("FINNHUB_API_KEY")));
    }

    #[test]
    fn test_error_body_is_provider_error() {
        let err = check_error_body(&json!({"error": "Invalid API key."})).unwrap_err();
        assert_eq!(err.to_string(), "Finnhub error: Invalid API key.");
        assert!(check_error_body(&json!([{"sector": "Energy"}])).is_ok());
    }

    #[test]
    fn test_parse_recommendations_takes_latest_period() {
        let body = json!([
            {"period": "2024-02-01", "strongBuy": 1, "buy": 2, "hold": 3, "sell": 0, "strongSell": 0, "symbol": "AAPL"},
            {"period": "2024-03-01", "strongBuy": 12, "buy": 20, "hold": 9, "sell": 1, "strongSell": 0, "symbol": "AAPL"}
        ]);
        let ratings = parse_recommendations("AAPL", body).unwrap();
        assert_eq!(ratings.period, "2024-03-01");
        assert_eq!(ratings.strong_buy, 12);
        assert_eq!(ratings.total(), 42);
    }

    #[test]
    fn test_parse_recommendations_empty() {
        let err = parse_recommendations("AAPL", json!([])).unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));
    }

    #[test]
    fn test_parse_insider_transactions_ignores_other_codes() {
        let body = json!({
            "symbol": "AAPL",
            "data": [
                {"name": "A", "change": 500, "transactionCode": "P", "transactionDate": "2024-03-01"},
                {"name": "B", "change": -200, "transactionCode": "S", "transactionDate": "2024-03-02"},
                {"name": "C", "change": 10000, "transactionCode": "M", "transactionDate": "2024-03-03"}
            ]
        });
        let summary = parse_insider_transactions(body).unwrap();
        assert_eq!(summary.purchases, 1);
        assert_eq!(summary.sales, 1);
        assert_eq!(summary.net_shares, 300);
    }

    #[test]
    fn test_parse_news_sentiment() {
        let body = json!({"companyNewsScore": 0.72, "sectorAverageNewsScore": 0.5, "symbol": "AAPL"});
        assert_eq!(parse_news_sentiment("AAPL", body).unwrap(), 0.72);

        let err = parse_news_sentiment("AAPL", json!({"symbol": "AAPL"})).unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));
    }

    #[test]
    fn test_basic_financials_fill_fundamentals() {
        let body = json!({"metric": {
            "52WeekHigh": 199.62,
            "52WeekLow": 164.08,
            "marketCapitalization": 2_700_000.0,
            "peBasicExclExtraTTM": 28.4
        }, "symbol": "AAPL"});
        let metric = decode::<MetricResponse>(body, PROVIDER).unwrap().metric;

        let mut fundamentals = Fundamentals {
            current_price: Some(180.0),
            ..Default::default()
        };
        metric.apply_to(&mut fundamentals);
        assert_eq!(fundamentals.current_price, Some(180.0));
        assert_eq!(fundamentals.week_52_high, Some(199.62));
        assert_eq!(fundamentals.pe_ratio, Some(28.4));
    }

    #[test]
    fn test_sector_performance_payload() {
        let body = json!([
            {"sector": "Technology", "change": 1.25},
            {"sector": "Energy", "change": "-0.40"}
        ]);
        let sectors: Vec<SectorPerformance> = decode(body, PROVIDER).unwrap();
        assert_eq!(sectors[1].change, Some(-0.4));
    }

    #[test]
    fn test_news_articles_tolerate_missing_fields() {
        let body = json!([{"headline": "NVDA and AMD rally", "datetime": 1_700_000_000}]);
        let articles: Vec<FinnhubNewsArticle> = decode(body, PROVIDER).unwrap();
        assert_eq!(articles[0].headline, "NVDA and AMD rally");
        assert!(articles[0].url.is_empty());
    }
}

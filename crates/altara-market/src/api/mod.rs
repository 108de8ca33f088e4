//! API clients for market data providers

pub mod finnhub;
pub mod newsapi;
pub mod yahoo;

pub use finnhub::{
    BasicFinancials, FinnhubClient, FinnhubNewsArticle, InsiderTransaction, NewsSentiment,
    RecommendationTrend, SectorPerformance,
};
pub use newsapi::{NewsApiClient, NewsArticle};
pub use yahoo::YahooFinanceClient;

use crate::error::{MarketError, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Per-minute limiter; a zero rate is treated as one request per minute
pub(crate) fn rate_limiter(per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Check the status and decode the body as JSON
pub(crate) async fn read_json(response: Response, provider: &'static str) -> Result<serde_json::Value> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(MarketError::RateLimitExceeded { provider });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MarketError::Provider {
            provider,
            message: format!("HTTP {status}: {body}"),
        });
    }

    response.json::<serde_json::Value>().await.map_err(|e| MarketError::Parse {
        provider,
        message: e.to_string(),
    })
}

/// Decode an already-fetched JSON value into a typed payload
pub(crate) fn decode<T: DeserializeOwned>(value: serde_json::Value, provider: &'static str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| MarketError::Parse {
        provider,
        message: e.to_string(),
    })
}

/// Deserialize a number that some providers send as a string
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
        Null,
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().trim_end_matches('%').parse().ok(),
        Some(NumberOrString::Null) | None => None,
    }
    .filter(|n: &f64| n.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_f64")]
        value: Option<f64>,
    }

    #[test]
    fn test_lenient_f64_accepts_numbers_and_strings() {
        let p: Probe = serde_json::from_str(r#"{"value": 1.5}"#).unwrap();
        assert_eq!(p.value, Some(1.5));
        let p: Probe = serde_json::from_str(r#"{"value": "-2.25%"}"#).unwrap();
        assert_eq!(p.value, Some(-2.25));
        let p: Probe = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(p.value, None);
        let p: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.value, None);
        let p: Probe = serde_json::from_str(r#"{"value": "n/a"}"#).unwrap();
        assert_eq!(p.value, None);
    }

    #[test]
    fn test_decode_maps_to_parse_error() {
        let err = decode::<Vec<String>>(serde_json::json!({"error": "bad key"}), "Finnhub")
            .unwrap_err();
        assert!(matches!(err, MarketError::Parse { provider: "Finnhub", .. }));
    }
}

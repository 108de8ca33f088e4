//! NewsAPI client for recent headlines

use super::{SharedRateLimiter, decode, http_client, rate_limiter, read_json};
use crate::config::{MarketConfig, NEWS_API_BASE_URL};
use crate::error::{MarketError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

const PROVIDER: &str = "NewsAPI";

/// Title NewsAPI substitutes for articles pulled by the publisher
const REMOVED_TITLE: &str = "[Removed]";

/// Extra articles requested to make up for blank and removed titles
const PAGE_HEADROOM: usize = 10;

/// NewsAPI caps `pageSize` at 100
const MAX_PAGE_SIZE: usize = 100;

/// Article source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSource {
    pub name: String,
}

/// One article of `/everything`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsArticle {
    pub source: NewsSource,
    pub title: String,
    pub url: String,
    pub published_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EverythingResponse {
    status: String,
    code: Option<String>,
    message: Option<String>,
    articles: Vec<NewsArticle>,
}

/// NewsAPI `/v2/everything` client
#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
    sort_by: String,
    rate_limiter: SharedRateLimiter,
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .field("sort_by", &self.sort_by)
            .field("api_key", &"***")
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: NEWS_API_BASE_URL.to_string(),
            language: "en".to_string(),
            sort_by: "publishedAt".to_string(),
            rate_limiter: rate_limiter(rate_limit),
        })
    }

    /// Build from configuration; fails when no NewsAPI key is configured
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let key = config
            .news_api_key
            .as_deref()
            .ok_or(MarketError::MissingCredential("NEWS_API_KEY"))?;
        let mut client = Self::new(key, config.news_rate_limit, config.request_timeout)?
            .with_base_url(&config.news_api_base_url);
        client.language = config.news_language.clone();
        client.sort_by = config.news_sort_by.clone();
        Ok(client)
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Articles matching `query`, most recent first
    #[instrument(skip(self))]
    pub async fn everything(&self, query: &str, page_size: usize) -> Result<Vec<NewsArticle>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/everything", self.base_url);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        tracing::debug!(%url, query, "newsapi request");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("sortBy", self.sort_by.as_str()),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        parse_everything(read_json(response, PROVIDER).await?)
    }

    /// Up to `limit` non-empty headline titles for `query`
    pub async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let articles = self.everything(query, page_size_for(limit)).await?;
        Ok(titles(articles, limit))
    }
}

fn parse_everything(body: serde_json::Value) -> Result<Vec<NewsArticle>> {
    let response: EverythingResponse = decode(body, PROVIDER)?;
    if response.status == "error" {
        let message = match (response.code, response.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (code, message) => code.or(message).unwrap_or_else(|| "unknown error".to_string()),
        };
        return Err(MarketError::Provider {
            provider: PROVIDER,
            message,
        });
    }
    Ok(response.articles)
}

fn page_size_for(limit: usize) -> usize {
    limit.saturating_add(PAGE_HEADROOM).min(MAX_PAGE_SIZE)
}

fn titles(articles: Vec<NewsArticle>, limit: usize) -> Vec<String> {
    articles
        .into_iter()
        .map(|a| a.title.trim().to_string())
        .filter(|t| !t.is_empty() && t != REMOVED_TITLE)
        .take(limit)
        .collect()
}

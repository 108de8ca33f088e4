//! Market overview: major indices, top movers, sectors, and AI stock picks

use crate::api::SectorPerformance;
use crate::config::MarketConfig;
use crate::error::Result;
use crate::model::PriceBar;
use crate::pipeline::{ASSISTANT_NOT_CONFIGURED, assistant_runner};
use crate::prompt::recommendations_prompt;
use crate::signals::percent_change;
use crate::sources::{MarketFeed, ProviderClients, QuoteSource};
use crate::ticker::Ticker;
use altara_assistant::{CancelToken, JobOutcome, JobRunner};
use altara_utils::Credentials;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

/// Symbol and display name of the tracked indices
pub const MAJOR_INDICES: [(&str, &str); 3] = [
    ("^DJI", "Dow Jones"),
    ("^IXIC", "Nasdaq"),
    ("^GSPC", "S&P 500"),
];

/// Headline tickers checked for movers
pub const MOVER_CANDIDATES: usize = 10;

/// Entries in each of the gainers and losers lists
pub const MOVERS_PER_SIDE: usize = 5;

/// Calendar days of history fetched to get the last two closes
const MOVER_HISTORY_DAYS: u32 = 7;

static TICKER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,5}\b").ok());

/// Latest session of one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub symbol: String,
    pub name: String,
    pub close: Option<f64>,
    /// Percent change from the session open
    pub change_pct: Option<f64>,
}

impl IndexQuote {
    fn from_bar(symbol: &str, name: &str, bar: Option<&PriceBar>) -> Self {
        let close = bar.map(|b| b.close).filter(|c| c.is_finite());
        let change_pct = bar
            .filter(|b| b.open != 0.0)
            .map(|b| ((b.close - b.open) / b.open * 10_000.0).round() / 100.0)
            .filter(|c| c.is_finite());

        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            close,
            change_pct,
        }
    }
}

/// A ticker and its percent change over the last two closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub ticker: Ticker,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopMovers {
    /// Best first
    pub gainers: Vec<Mover>,
    /// Worst first
    pub losers: Vec<Mover>,
}

/// Distinct upper-case words of 1-5 letters, in order of first appearance
pub fn extract_candidates<S: AsRef<str>>(headlines: &[S], limit: usize) -> Vec<Ticker> {
    let Some(pattern) = TICKER_PATTERN.as_ref() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    headlines
        .iter()
        .flat_map(|h| pattern.find_iter(h.as_ref()).map(|m| m.as_str().to_string()))
        .filter(|word| seen.insert(word.clone()))
        .filter_map(|word| Ticker::parse(&word).ok())
        .take(limit)
        .collect()
}

/// Sort by change, best first, and take `per_side` from each end
pub fn rank_movers(mut movers: Vec<Mover>, per_side: usize) -> TopMovers {
    movers.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));

    let gainers = movers.iter().take(per_side).cloned().collect();
    let losers = movers.iter().rev().take(per_side).cloned().collect();

    TopMovers { gainers, losers }
}

/// Market-wide dashboard data
pub struct MarketOverview {
    quotes: Arc<dyn QuoteSource>,
    feed: Arc<dyn MarketFeed>,
    runner: Option<JobRunner>,
}

impl MarketOverview {
    pub fn new(quotes: Arc<dyn QuoteSource>, feed: Arc<dyn MarketFeed>) -> Self {
        Self {
            quotes,
            feed,
            runner: None,
        }
    }

    /// Wire Yahoo, Finnhub, and, if configured, the OpenAI assistant
    pub fn from_credentials(config: &MarketConfig, credentials: &Credentials) -> Result<Self> {
        let providers = ProviderClients::from_config(config)?;
        let overview = Self::new(providers.quotes(), providers.market_feed());
        Ok(match assistant_runner(config, credentials)? {
            Some(runner) => overview.with_runner(runner),
            None => overview,
        })
    }

    pub fn with_runner(mut self, runner: JobRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Latest session of each major index; failed lookups are unavailable
    #[instrument(skip(self))]
    pub async fn index_summary(&self) -> Vec<IndexQuote> {
        let lookups = MAJOR_INDICES.iter().map(|&(symbol, name)| async move {
            let bar = match Ticker::parse(symbol) {
                Ok(ticker) => match self.quotes.latest_bar(&ticker).await {
                    Ok(bar) => Some(bar),
                    Err(e) => {
                        warn!(symbol, error = %e, "index quote unavailable");
                        None
                    }
                },
                Err(_) => None,
            };
            IndexQuote::from_bar(symbol, name, bar.as_ref())
        });

        join_all(lookups).await
    }

    /// Gainers and losers among tickers named in general market news
    #[instrument(skip(self))]
    pub async fn top_movers(&self) -> Result<TopMovers> {
        let headlines = self.feed.market_headlines().await?;
        let candidates = extract_candidates(&headlines, MOVER_CANDIDATES);
        debug!(candidates = candidates.len(), "mover candidates");

        let changes = candidates.into_iter().map(|ticker| async move {
            match self.quotes.price_history(&ticker, MOVER_HISTORY_DAYS).await {
                Ok(series) => percent_change(&series.closes(), 2)
                    .value()
                    .map(|change_pct| Mover { ticker, change_pct }),
                Err(e) => {
                    debug!(%ticker, error = %e, "skipping mover candidate");
                    None
                }
            }
        });

        let movers = join_all(changes).await.into_iter().flatten().collect();
        Ok(rank_movers(movers, MOVERS_PER_SIDE))
    }

    #[instrument(skip(self))]
    pub async fn sector_performance(&self) -> Result<Vec<SectorPerformance>> {
        self.feed.sector_performance().await
    }

    /// Ask the assistant for three stock picks
    pub async fn recommendations(&self, cancel: &CancelToken) -> JobOutcome {
        let Some(runner) = &self.runner else {
            return JobOutcome::Failed {
                reason: ASSISTANT_NOT_CONFIGURED.to_string(),
            };
        };

        match runner.run(recommendations_prompt(), cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "recommendations request failed");
                JobOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::model::PriceSeries;
    use crate::sources::{MockMarketFeed, MockQuoteSource};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn mover(symbol: &str, change_pct: f64) -> Mover {
        Mover {
            ticker: Ticker::parse(symbol).unwrap(),
            change_pct,
        }
    }

    fn symbols(movers: &[Mover]) -> Vec<&str> {
        movers.iter().map(|m| m.ticker.as_str()).collect()
    }

    #[test]
    fn test_extract_candidates() {
        let headlines = [
            "NVDA and AMD rally as AI demand grows",
            "Fed holds rates; NVDA extends gains",
            "lowercase words are ignored",
            "TOOLONGWORD is not a ticker",
        ];
        let candidates = extract_candidates(&headlines, 10);
        let names: Vec<_> = candidates.iter().map(Ticker::as_str).collect();
        assert_eq!(names, vec!["NVDA", "AMD", "AI"]);

        assert_eq!(extract_candidates(&headlines, 2).len(), 2);
        assert!(extract_candidates::<&str>(&[], 10).is_empty());
    }

    #[test]
    fn test_rank_movers() {
        let movers = vec![
            mover("A", 1.0),
            mover("B", -3.0),
            mover("C", 4.5),
            mover("D", 0.2),
            mover("E", -0.7),
        ];
        let ranked = rank_movers(movers, 2);
        assert_eq!(symbols(&ranked.gainers), vec!["C", "A"]);
        assert_eq!(symbols(&ranked.losers), vec!["B", "E"]);

        let empty = rank_movers(Vec::new(), 5);
        assert!(empty.gainers.is_empty() && empty.losers.is_empty());
    }

    #[test]
    fn test_index_quote_from_bar() {
        let bar = PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap(),
            open: 100.0,
            high: 103.0,
            low: 99.0,
            close: 102.35,
            volume: 0,
        };
        let quote = IndexQuote::from_bar("^GSPC", "S&P 500", Some(&bar));
        assert_eq!(quote.close, Some(102.35));
        assert_eq!(quote.change_pct, Some(2.35));

        let missing = IndexQuote::from_bar("^DJI", "Dow Jones", None);
        assert_eq!(missing.close, None);
        assert_eq!(missing.change_pct, None);
    }

    #[tokio::test]
    async fn test_index_summary_degrades_per_index() {
        let mut quotes = MockQuoteSource::new();
        quotes.expect_latest_bar().returning(|ticker| {
            if ticker.as_str() == "^IXIC" {
                return Err(MarketError::YahooFinanceError("timeout".to_string()));
            }
            Ok(PriceBar {
                timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap(),
                open: 50.0,
                high: 51.0,
                low: 49.0,
                close: 51.0,
                volume: 0,
            })
        });

        let overview = MarketOverview::new(Arc::new(quotes), Arc::new(MockMarketFeed::new()));
        let summary = overview.index_summary().await;

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].name, "Dow Jones");
        assert_eq!(summary[0].change_pct, Some(2.0));
        assert_eq!(summary[1].name, "Nasdaq");
        assert_eq!(summary[1].close, None);
    }

    #[tokio::test]
    async fn test_top_movers_skips_failed_lookups() {
        let mut feed = MockMarketFeed::new();
        feed.expect_market_headlines().returning(|| {
            Ok(vec![
                "NVDA jumps while INTC slides".to_string(),
                "XYZQ halted".to_string(),
            ])
        });

        let mut quotes = MockQuoteSource::new();
        quotes.expect_price_history().returning(|ticker, _| {
            let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
            match ticker.as_str() {
                "NVDA" => Ok(PriceSeries::from_closes("NVDA", start, &[100.0, 110.0])),
                "INTC" => Ok(PriceSeries::from_closes("INTC", start, &[40.0, 38.0])),
                other => Err(MarketError::DataUnavailable {
                    symbol: other.to_string(),
                    reason: "no price bars returned".to_string(),
                }),
            }
        });

        let overview = MarketOverview::new(Arc::new(quotes), Arc::new(feed));
        let movers = overview.top_movers().await.unwrap();

        assert_eq!(symbols(&movers.gainers), vec!["NVDA", "INTC"]);
        assert_eq!(movers.gainers[0].change_pct, 10.0);
        assert_eq!(symbols(&movers.losers), vec!["INTC", "NVDA"]);
        assert_eq!(movers.losers[0].change_pct, -5.0);
    }

    #[tokio::test]
    async fn test_top_movers_propagates_news_failure() {
        let mut feed = MockMarketFeed::new();
        feed.expect_market_headlines()
            .returning(|| Err(MarketError::MissingCredential("FINNHUB_API_KEY")));

        let overview = MarketOverview::new(Arc::new(MockQuoteSource::new()), Arc::new(feed));
        assert!(overview.top_movers().await.is_err());
    }

    #[tokio::test]
    async fn test_recommendations_without_assistant() {
        let overview = MarketOverview::new(
            Arc::new(MockQuoteSource::new()),
            Arc::new(MockMarketFeed::new()),
        );
        let outcome = overview.recommendations(&CancelToken::new()).await;
        assert!(!outcome.is_completed());
    }
}

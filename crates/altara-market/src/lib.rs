//! Market data and AI report pipeline for Altara
//!
//! This crate turns a ticker into an [`AnalysisReport`]:
//!
//! - Price history from Yahoo Finance, basic financials, analyst ratings,
//!   insider activity, and news sentiment from Finnhub, headlines from NewsAPI
//! - Moving averages, percent change, and trend forecasts ([`signals`])
//! - A labeled prompt rendered with MiniJinja ([`prompt`])
//! - A bounded, cancellable assistant job ([`altara_assistant::JobRunner`])
//!
//! Provider failures never abort a report. Each one is logged, recorded as a
//! [`DataWarning`], and rendered as `unavailable`.
//!
//! # Example
//!
//! ```rust,ignore
//! use altara_assistant::CancelToken;
//! use altara_market::{AnalysisPipeline, MarketConfig};
//! use altara_utils::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::from_env();
//!     let config = MarketConfig::builder().credentials(&credentials).build()?;
//!     let pipeline = AnalysisPipeline::from_credentials(config, &credentials)?;
//!
//!     let report = pipeline.analyze("aapl", &CancelToken::new()).await?;
//!     println!("{}", report.prompt);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod overview;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod signals;
pub mod sources;
pub mod ticker;
pub mod watchlist;

// Re-export main types for convenience
pub use config::{MarketConfig, MarketConfigBuilder};
pub use error::{MarketError, Result};
pub use model::{
    AnalystRatings, Consensus, ContextBundle, ForecastPoint, Fundamentals, InsiderSummary,
    PriceBar, PriceSeries, Signal, SignalSet, UnavailableReason,
};
pub use overview::{IndexQuote, MarketOverview, Mover, TopMovers};
pub use pipeline::AnalysisPipeline;
pub use prompt::PromptComposer;
pub use report::{AnalysisReport, ChartPanels, ChartRow, DataComponent, DataWarning};
pub use signals::{Forecast, ForecastMethod, SignalCalculator};
pub use sources::{
    ContextSource, HeadlineSource, MarketFeed, ProviderClients, QuoteFetcher, QuoteSource,
};
pub use ticker::Ticker;
pub use watchlist::Watchlist;

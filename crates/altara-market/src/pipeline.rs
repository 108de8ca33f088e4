//! Analysis pipeline: fetch, compute, compose, ask, assemble

use crate::config::MarketConfig;
use crate::error::Result;
use crate::model::{ContextBundle, PriceSeries};
use crate::prompt::PromptComposer;
use crate::report::{AnalysisReport, ChartPanels, DataComponent, DataWarning};
use crate::signals::SignalCalculator;
use crate::sources::{ContextSource, HeadlineSource, ProviderClients, QuoteSource};
use crate::ticker::Ticker;
use altara_assistant::providers::{OpenAIAssistantsClient, OpenAIConfig};
use altara_assistant::{CancelToken, JobOutcome, JobRunner};
use altara_utils::Credentials;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Reason recorded when no assistant is configured
pub const ASSISTANT_NOT_CONFIGURED: &str = "assistant not configured (set OPENAI_API_KEY and ASSISTANT_ID)";

/// Build a job runner from credentials; `None` when a key or the assistant id is missing
pub fn assistant_runner(config: &MarketConfig, credentials: &Credentials) -> Result<Option<JobRunner>> {
    let (Some(api_key), Some(assistant_id)) = (
        credentials.openai_api_key.as_deref(),
        config.assistant_id.as_deref(),
    ) else {
        return Ok(None);
    };

    let mut openai = OpenAIConfig::new(api_key).with_timeout(config.request_timeout.as_secs().max(1));
    if let Some(base) = altara_utils::env_var("OPENAI_API_BASE") {
        openai = openai.with_api_base(base);
    }
    let client = OpenAIAssistantsClient::with_config(openai)?;

    Ok(Some(JobRunner::new(
        Arc::new(client),
        assistant_id,
        config.poll_policy(),
    )))
}

/// Collects warnings for failed inputs and logs each one
#[derive(Debug, Default)]
struct Degradations(Vec<DataWarning>);

impl Degradations {
    fn take<T>(&mut self, component: DataComponent, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%component, error = %e, "input degraded to unavailable");
                self.0.push(DataWarning {
                    component,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn push(&mut self, component: DataComponent, message: impl Into<String>) {
        self.0.push(DataWarning {
            component,
            message: message.into(),
        });
    }
}

/// Runs one analysis request end to end
pub struct AnalysisPipeline {
    config: MarketConfig,
    quotes: Arc<dyn QuoteSource>,
    headlines: Arc<dyn HeadlineSource>,
    context: Arc<dyn ContextSource>,
    runner: Option<JobRunner>,
    calculator: SignalCalculator,
    composer: PromptComposer,
}

impl AnalysisPipeline {
    pub fn new(
        config: MarketConfig,
        quotes: Arc<dyn QuoteSource>,
        headlines: Arc<dyn HeadlineSource>,
        context: Arc<dyn ContextSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: SignalCalculator::new(&config),
            composer: PromptComposer::new(&config)?,
            config,
            quotes,
            headlines,
            context,
            runner: None,
        })
    }

    /// Wire the production sources and, if configured, the OpenAI assistant
    pub fn from_credentials(config: MarketConfig, credentials: &Credentials) -> Result<Self> {
        let runner = assistant_runner(&config, credentials)?;
        if runner.is_none() {
            warn!("{}", ASSISTANT_NOT_CONFIGURED);
        }

        let providers = ProviderClients::from_config(&config)?;
        let pipeline = Self::new(
            config,
            providers.quotes(),
            providers.headlines(),
            providers.context(),
        )?;
        Ok(match runner {
            Some(runner) => pipeline.with_runner(runner),
            None => pipeline,
        })
    }

    pub fn with_runner(mut self, runner: JobRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn has_assistant(&self) -> bool {
        self.runner.is_some()
    }

    /// Analyze a user-entered ticker.
    ///
    /// Fails only on an invalid ticker or a broken prompt template. Every
    /// provider failure becomes a [`DataWarning`] and an "unavailable" field.
    pub async fn analyze(&self, raw_ticker: &str, cancel: &CancelToken) -> Result<AnalysisReport> {
        let ticker = Ticker::parse(raw_ticker)?;
        self.analyze_ticker(&ticker, cancel).await
    }

    #[instrument(skip(self, ticker, cancel), fields(ticker = %ticker))]
    pub async fn analyze_ticker(&self, ticker: &Ticker, cancel: &CancelToken) -> Result<AnalysisReport> {
        info!("starting analysis");
        let mut degraded = Degradations::default();

        let (history, fundamentals, headlines, analyst, insider, sentiment) = tokio::join!(
            self.quotes.price_history(ticker, self.config.history_days),
            self.quotes.fundamentals(ticker),
            self.headlines
                .headlines(ticker.as_str(), self.config.headline_limit),
            self.context.analyst_ratings(ticker),
            self.context.insider_summary(ticker),
            self.context.news_sentiment(ticker),
        );

        let series = degraded
            .take(DataComponent::PriceHistory, history)
            .unwrap_or_else(|| PriceSeries::new(ticker.as_str(), Vec::new()));
        let fundamentals = degraded
            .take(DataComponent::Fundamentals, fundamentals)
            .unwrap_or_default();
        let headlines = degraded
            .take(DataComponent::Headlines, headlines)
            .unwrap_or_default();

        let context = ContextBundle {
            analyst: degraded.take(DataComponent::AnalystRatings, analyst),
            insider: degraded.take(DataComponent::InsiderActivity, insider),
            ..Default::default()
        }
        .with_headlines(headlines, self.config.headline_limit)
        .with_sentiment(degraded.take(DataComponent::Sentiment, sentiment));

        let signals = self.calculator.compute(&series);
        let forecast = self.calculator.forecast(&series);
        info!(bars = series.len(), signals = signals.len(), "signals computed");

        let prompt = self
            .composer
            .compose(ticker, &signals, &forecast, &fundamentals, &context)?;

        let assistant = self.ask(&prompt, cancel, &mut degraded).await;

        let report = AnalysisReport {
            ticker: ticker.clone(),
            generated_at: Utc::now(),
            charts: ChartPanels::build(&series, self.calculator.ma_windows(), &forecast),
            signals,
            forecast,
            fundamentals,
            context,
            prompt,
            assistant,
            warnings: degraded.0,
        };

        info!(
            warnings = report.warnings.len(),
            completed = report.assistant.is_completed(),
            "analysis finished"
        );
        Ok(report)
    }

    async fn ask(&self, prompt: &str, cancel: &CancelToken, degraded: &mut Degradations) -> JobOutcome {
        let Some(runner) = &self.runner else {
            degraded.push(DataComponent::Assistant, ASSISTANT_NOT_CONFIGURED);
            return JobOutcome::Failed {
                reason: ASSISTANT_NOT_CONFIGURED.to_string(),
            };
        };

        match runner.run(prompt, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "assistant request failed");
                degraded.push(DataComponent::Assistant, e.to_string());
                JobOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

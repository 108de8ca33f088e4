//! Prompt composition for the assistant
//!
//! Renders signals, fundamentals, and context into one labeled text block.
//! Any missing value renders as `unavailable`; an empty headline list
//! renders as `no recent headlines`.

use crate::config::MarketConfig;
use crate::error::Result;
use crate::model::{ContextBundle, Fundamentals, Signal, SignalSet};
use crate::signals::{Forecast, SignalCalculator};
use crate::ticker::Ticker;
use minijinja::Environment;
use serde::Serialize;

pub const UNAVAILABLE: &str = "unavailable";
pub const NO_HEADLINES: &str = "no recent headlines";

const ANALYSIS_TEMPLATE_NAME: &str = "analysis";

const ANALYSIS_TEMPLATE: &str = "\
You are a financial AI assistant. Analyze {{ ticker }} using the market data below. \
Cover the price trend, momentum, news tone, analyst and insider positioning, \
and finish with a short-term outlook and the key risks. Keep it concise.

=== PRICE SIGNALS ===
{% for field in signals %}
{{ field.label }}: {{ field.value }}
{% endfor %}

=== FUNDAMENTALS ===
{% for field in fundamentals %}
{{ field.label }}: {{ field.value }}
{% endfor %}

=== RECENT HEADLINES ===
{% for headline in headlines %}
- {{ headline }}
{% else %}
- {{ no_headlines }}
{% endfor %}

=== ANALYSTS, INSIDERS, SENTIMENT ===
Analyst consensus: {{ analyst }}
Insider activity: {{ insider }}
News sentiment (0-1): {{ sentiment }}
";

const RECOMMENDATIONS_PROMPT: &str = "\
You are a financial AI assistant. List 3 U.S. stocks that look attractive right now \
based on a combination of sentiment, technicals, and growth potential. Present in this format:

1. **[TICKER] - Company Name**
- Reason 1
- Reason 2
- Reason 3

Only list 3 and keep it concise.
";

/// Fixed prompt asking for three stock picks
pub fn recommendations_prompt() -> &'static str {
    RECOMMENDATIONS_PROMPT
}

#[derive(Debug, Serialize)]
struct Field {
    label: String,
    value: String,
}

impl Field {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalysisView<'a> {
    ticker: &'a str,
    signals: Vec<Field>,
    fundamentals: Vec<Field>,
    headlines: &'a [String],
    no_headlines: &'static str,
    analyst: String,
    insider: String,
    sentiment: String,
}

fn or_unavailable<T>(value: Option<T>, format: impl FnOnce(T) -> String) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), format)
}

fn price(value: Option<f64>) -> String {
    or_unavailable(value, |v| format!("{v:.2}"))
}

fn percent(signal: Signal) -> String {
    or_unavailable(signal.value(), |v| format!("{v:+.2}%"))
}

/// Renders the analysis prompt
pub struct PromptComposer {
    env: Environment<'static>,
    ma_windows: Vec<usize>,
    pct_change_window: usize,
}

impl PromptComposer {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template(ANALYSIS_TEMPLATE_NAME, ANALYSIS_TEMPLATE)?;

        Ok(Self {
            env,
            ma_windows: config.ma_windows.clone(),
            pct_change_window: config.pct_change_window,
        })
    }

    fn signal_fields(&self, signals: &SignalSet, forecast: &Forecast) -> Vec<Field> {
        let mut fields = vec![Field::new("Last close", price(signals.get("last_close").value()))];

        for &window in &self.ma_windows {
            fields.push(Field::new(
                format!("{window}-day moving average"),
                price(signals.get(&SignalCalculator::ma_key(window)).value()),
            ));
        }

        let pct_key = SignalCalculator::pct_change_key(self.pct_change_window);
        fields.push(Field::new(
            format!("{}-day change", self.pct_change_window),
            percent(signals.get(&pct_key)),
        ));

        fields.push(Field::new(
            format!("{}-day forecast ({})", forecast.points.len(), forecast.method),
            price(forecast.last_value()),
        ));

        fields
    }

    fn fundamental_fields(fundamentals: &Fundamentals) -> Vec<Field> {
        vec![
            Field::new("Current price", price(fundamentals.current_price)),
            Field::new("Volume", or_unavailable(fundamentals.volume, |v| v.to_string())),
            Field::new("52-week high", price(fundamentals.week_52_high)),
            Field::new("52-week low", price(fundamentals.week_52_low)),
            Field::new(
                "Market cap",
                or_unavailable(fundamentals.market_cap, |v| format!("${v:.0}M")),
            ),
            Field::new("P/E ratio", price(fundamentals.pe_ratio)),
        ]
    }

    /// Render the analysis prompt for one ticker
    pub fn compose(
        &self,
        ticker: &Ticker,
        signals: &SignalSet,
        forecast: &Forecast,
        fundamentals: &Fundamentals,
        context: &ContextBundle,
    ) -> Result<String> {
        let analyst = or_unavailable(context.analyst.as_ref(), |a| {
            format!(
                "{} (strong buy {}, buy {}, hold {}, sell {}, strong sell {})",
                a.consensus(),
                a.strong_buy,
                a.buy,
                a.hold,
                a.sell,
                a.strong_sell
            )
        });
        let insider = or_unavailable(context.insider, |i| {
            format!(
                "{} purchases, {} sales, net {:+} shares",
                i.purchases, i.sales, i.net_shares
            )
        });

        let view = AnalysisView {
            ticker: ticker.as_str(),
            signals: self.signal_fields(signals, forecast),
            fundamentals: Self::fundamental_fields(fundamentals),
            headlines: &context.headlines,
            no_headlines: NO_HEADLINES,
            analyst,
            insider,
            sentiment: or_unavailable(context.sentiment, |s| format!("{s:.2}")),
        };

        let template = self.env.get_template(ANALYSIS_TEMPLATE_NAME)?;
        Ok(template.render(&view)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalystRatings, InsiderSummary, PriceSeries};
    use crate::signals::ForecastMethod;
    use chrono::NaiveDate;

    fn composer() -> PromptComposer {
        PromptComposer::new(&MarketConfig::default()).unwrap()
    }

    fn empty_forecast() -> Forecast {
        Forecast {
            method: ForecastMethod::Linear,
            points: Vec::new(),
        }
    }

    #[test]
    fn test_missing_values_render_unavailable() {
        let ticker = Ticker::parse("aapl").unwrap();
        let prompt = composer()
            .compose(
                &ticker,
                &SignalSet::new(),
                &empty_forecast(),
                &Fundamentals::default(),
                &ContextBundle::default(),
            )
            .unwrap();

        assert!(prompt.contains("Analyze AAPL"));
        assert!(prompt.contains("Last close: unavailable"));
        assert!(prompt.contains("7-day moving average: unavailable"));
        assert!(prompt.contains("30-day moving average: unavailable"));
        assert!(prompt.contains("7-day change: unavailable"));
        assert!(prompt.contains("P/E ratio: unavailable"));
        assert!(prompt.contains(&format!("- {NO_HEADLINES}\n")));
        assert!(prompt.contains("Analyst consensus: unavailable"));
        assert!(prompt.contains("News sentiment (0-1): unavailable"));
    }

    #[test]
    fn test_full_prompt() {
        let config = MarketConfig::default();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = PriceSeries::from_closes(
            "AAPL",
            start,
            &[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0],
        );
        let calculator = SignalCalculator::new(&config);
        let signals = calculator.compute(&series);
        let forecast = calculator.forecast(&series);

        let context = ContextBundle {
            analyst: Some(AnalystRatings {
                period: "2024-01-01".to_string(),
                strong_buy: 10,
                buy: 5,
                ..Default::default()
            }),
            insider: Some(InsiderSummary {
                purchases: 1,
                sales: 3,
                net_shares: -1200,
            }),
            ..Default::default()
        }
        .with_headlines(vec!["Apple & partners expand".into(), "Chip demand rises".into()], 5)
        .with_sentiment(Some(0.64));

        let fundamentals = Fundamentals {
            current_price: Some(16.0),
            market_cap: Some(2_500.4),
            ..Default::default()
        };

        let ticker = Ticker::parse("AAPL").unwrap();
        let prompt = PromptComposer::new(&config)
            .unwrap()
            .compose(&ticker, &signals, &forecast, &fundamentals, &context)
            .unwrap();

        assert!(prompt.contains("Last close: 16.00"));
        assert!(prompt.contains("7-day moving average: 13.00"));
        assert!(prompt.contains("30-day moving average: unavailable"));
        assert!(prompt.contains("7-day change: +60.00%"));
        assert!(prompt.contains("30-day forecast (linear regression): 46.00"));
        assert!(prompt.contains("Market cap: $2500M"));
        assert!(prompt.contains("- Apple & partners expand\n- Chip demand rises\n"));
        assert!(!prompt.contains(NO_HEADLINES));
        assert!(prompt.contains("Analyst consensus: Buy (strong buy 10, buy 5"));
        assert!(prompt.contains("Insider activity: 1 purchases, 3 sales, net -1200 shares"));
        assert!(prompt.contains("News sentiment (0-1): 0.64"));
    }

    #[test]
    fn test_recommendations_prompt() {
        let prompt = recommendations_prompt();
        assert!(prompt.contains("List 3 U.S. stocks"));
        assert!(prompt.contains("Only list 3"));
    }
}

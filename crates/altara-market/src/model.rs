//! Market data model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Calendar date of the bar (UTC)
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Price history for one symbol, ordered oldest to newest.
///
/// Immutable once built; bars with a non-finite close are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.retain(|b| b.close.is_finite());
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Build a series of closes on consecutive days starting at `start`
    pub fn from_closes(symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, day)| PriceBar {
                timestamp: day.and_time(chrono::NaiveTime::MIN).and_utc(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0,
            })
            .collect();
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last().map(PriceBar::date)
    }

    /// The trailing `n` bars (fewer if the series is shorter)
    pub fn window(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }
}

/// Descriptive quote fields; every field is best-effort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub current_price: Option<f64>,
    pub volume: Option<u64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    /// Market capitalization in millions of USD
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
}

/// Why a statistic could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The window needs more observations than the series holds
    InsufficientHistory { required: usize, actual: usize },
    /// The reference value of a ratio was zero
    DivisionByZero,
    /// The computation produced `inf` or `NaN`
    NonFinite,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientHistory { required, actual } => {
                write!(f, "needs {required} observations, have {actual}")
            }
            Self::DivisionByZero => f.write_str("reference value is zero"),
            Self::NonFinite => f.write_str("result is not finite"),
        }
    }
}

/// A derived statistic or the reason it is missing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Value(f64),
    Unavailable(UnavailableReason),
}

impl Signal {
    /// Wrap a computed value, rejecting `inf` and `NaN`
    pub fn checked(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Unavailable(UnavailableReason::NonFinite)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::Unavailable(_) => f.write_str("unavailable"),
        }
    }
}

/// Named statistics derived from a price series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    values: BTreeMap<String, Signal>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, signal: Signal) {
        self.values.insert(name.into(), signal);
    }

    /// Look up a signal; unknown names read as unavailable with no history
    pub fn get(&self, name: &str) -> Signal {
        self.values.get(name).copied().unwrap_or(Signal::Unavailable(
            UnavailableReason::InsufficientHistory {
                required: 1,
                actual: 0,
            },
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signal)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One extrapolated close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Analyst recommendation counts for one period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystRatings {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

/// Plurality view of analyst ratings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consensus {
    Buy,
    Hold,
    Sell,
}

impl std::fmt::Display for Consensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Buy => "Buy",
            Self::Hold => "Hold",
            Self::Sell => "Sell",
        })
    }
}

impl AnalystRatings {
    pub fn total(&self) -> u32 {
        self.strong_buy + self.buy + self.hold + self.sell + self.strong_sell
    }

    /// Plurality of buy / hold / sell, strong ratings merged; ties are Hold
    pub fn consensus(&self) -> Consensus {
        let buys = self.strong_buy + self.buy;
        let sells = self.strong_sell + self.sell;
        if buys > self.hold && buys > sells {
            Consensus::Buy
        } else if sells > self.hold && sells > buys {
            Consensus::Sell
        } else {
            Consensus::Hold
        }
    }
}

/// Direction of an insider transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsiderActivity {
    Purchase,
    Sale,
}

impl InsiderActivity {
    /// SEC Form 4 transaction code; only open-market `P` and `S` count
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(Self::Purchase),
            "S" => Some(Self::Sale),
            _ => None,
        }
    }
}

/// Aggregate of recent insider transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsiderSummary {
    pub purchases: u32,
    pub sales: u32,
    /// Shares bought minus shares sold
    pub net_shares: i64,
}

impl InsiderSummary {
    /// Fold `(activity, share change)` records into a summary
    pub fn from_records(records: impl IntoIterator<Item = (InsiderActivity, i64)>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut acc, (activity, shares)| {
                match activity {
                    InsiderActivity::Purchase => {
                        acc.purchases += 1;
                        acc.net_shares += shares.abs();
                    }
                    InsiderActivity::Sale => {
                        acc.sales += 1;
                        acc.net_shares -= shares.abs();
                    }
                }
                acc
            })
    }
}

/// Auxiliary facts about a ticker; each part is independently optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Most recent first
    pub headlines: Vec<String>,
    pub analyst: Option<AnalystRatings>,
    pub insider: Option<InsiderSummary>,
    /// News sentiment in [0, 1]
    pub sentiment: Option<f64>,
}

impl ContextBundle {
    /// Keep at most `limit` headlines, dropping blanks
    pub fn with_headlines(mut self, headlines: Vec<String>, limit: usize) -> Self {
        self.headlines = headlines
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .take(limit)
            .collect();
        self
    }

    /// Set the sentiment score, clamped to [0, 1]; non-finite scores are dropped
    pub fn with_sentiment(mut self, score: Option<f64>) -> Self {
        self.sentiment = score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 1.0));
        self
    }
}

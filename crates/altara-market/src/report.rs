//! Analysis report types

use crate::model::{ContextBundle, ForecastPoint, Fundamentals, PriceSeries, SignalSet};
use crate::signals::{Forecast, moving_average_series};
use crate::ticker::Ticker;
use altara_assistant::JobOutcome;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Part of the report a degraded input belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataComponent {
    PriceHistory,
    Fundamentals,
    Headlines,
    AnalystRatings,
    InsiderActivity,
    Sentiment,
    Assistant,
}

impl std::fmt::Display for DataComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PriceHistory => "price history",
            Self::Fundamentals => "fundamentals",
            Self::Headlines => "headlines",
            Self::AnalystRatings => "analyst ratings",
            Self::InsiderActivity => "insider activity",
            Self::Sentiment => "sentiment",
            Self::Assistant => "assistant",
        })
    }
}

/// A provider failure that was degraded to "unavailable"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWarning {
    pub component: DataComponent,
    pub message: String,
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} unavailable: {}", self.component, self.message)
    }
}

/// One row of the price panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    pub date: NaiveDate,
    pub close: f64,
    /// Moving averages aligned with [`ChartPanels::ma_windows`]
    pub moving_averages: Vec<Option<f64>>,
}

/// Data behind the price and forecast panels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartPanels {
    pub ma_windows: Vec<usize>,
    pub price: Vec<ChartRow>,
    pub forecast: Vec<ForecastPoint>,
}

impl ChartPanels {
    pub fn build(series: &PriceSeries, ma_windows: &[usize], forecast: &Forecast) -> Self {
        let closes = series.closes();
        let averages: Vec<Vec<Option<f64>>> = ma_windows
            .iter()
            .map(|&w| moving_average_series(&closes, w))
            .collect();

        let price = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| ChartRow {
                date: bar.date(),
                close: bar.close,
                moving_averages: averages.iter().map(|column| column[i]).collect(),
            })
            .collect();

        Self {
            ma_windows: ma_windows.to_vec(),
            price,
            forecast: forecast.points.clone(),
        }
    }

    /// The trailing `n` rows of the price panel
    pub fn recent(&self, n: usize) -> &[ChartRow] {
        &self.price[self.price.len().saturating_sub(n)..]
    }
}

/// Everything produced by one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: Ticker,
    pub generated_at: DateTime<Utc>,
    pub signals: SignalSet,
    pub forecast: Forecast,
    pub fundamentals: Fundamentals,
    pub context: ContextBundle,
    pub prompt: String,
    pub assistant: JobOutcome,
    pub charts: ChartPanels,
    pub warnings: Vec<DataWarning>,
}

impl AnalysisReport {
    /// Whether any input degraded to "unavailable"
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_warning(&self, component: DataComponent) -> bool {
        self.warnings.iter().any(|w| w.component == component)
    }
}

//! Signal calculation: moving averages, percent change, trend forecasts
//!
//! Every function here is pure. A statistic whose window is longer than the
//! available history is reported as [`Signal::Unavailable`], never as zero
//! and never as an error.

use crate::config::MarketConfig;
use crate::model::{ForecastPoint, PriceSeries, Signal, SignalSet, UnavailableReason};
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Trend model used to extrapolate closes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Ordinary least squares on the observation index
    Linear,
    /// Exponential smoothing with additive trend
    Holt { alpha: f64, beta: f64 },
}

impl ForecastMethod {
    /// Holt smoothing with the default factors
    pub fn holt() -> Self {
        Self::Holt {
            alpha: 0.5,
            beta: 0.1,
        }
    }
}

impl std::fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => f.write_str("linear regression"),
            Self::Holt { alpha, beta } => write!(f, "Holt (alpha={alpha}, beta={beta})"),
        }
    }
}

/// Extrapolated closes, one per calendar day after the last observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value at the end of the horizon
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

fn insufficient(required: usize, actual: usize) -> Signal {
    Signal::Unavailable(UnavailableReason::InsufficientHistory { required, actual })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the last `window` closes
pub fn simple_moving_average(closes: &[f64], window: usize) -> Signal {
    if window == 0 || closes.len() < window {
        return insufficient(window.max(1), closes.len());
    }

    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return insufficient(window, closes.len());
    };
    let mut current = f64::NAN;
    for &close in &closes[closes.len() - window..] {
        current = sma.next(close);
    }
    Signal::checked(current)
}

/// Rolling moving average aligned with `closes`; `None` until the window fills
pub fn moving_average_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return vec![None; closes.len()];
    };
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = sma.next(close);
            (i + 1 >= window).then_some(value)
        })
        .collect()
}

/// Percent change across the trailing `window` observations.
///
/// The reference close is the first close of the window, so a 7-observation
/// window compares the latest close with the close six observations earlier.
/// Rounded to 2 decimals.
pub fn percent_change(closes: &[f64], window: usize) -> Signal {
    let required = window.max(2);
    if closes.len() < required {
        return insufficient(required, closes.len());
    }

    let reference = closes[closes.len() - required];
    let latest = closes[closes.len() - 1];
    if reference == 0.0 {
        return Signal::Unavailable(UnavailableReason::DivisionByZero);
    }

    Signal::checked(round2((latest - reference) / reference * 100.0))
}

/// Fit `method` to the closes and extrapolate `steps` calendar days.
///
/// Fewer than two observations, or zero steps, gives an empty forecast.
pub fn forecast(series: &PriceSeries, steps: usize, method: ForecastMethod) -> Forecast {
    let closes = series.closes();
    let empty = Forecast {
        method,
        points: Vec::new(),
    };
    let Some(last_date) = series.last_date() else {
        return empty;
    };
    if closes.len() < 2 || steps == 0 {
        return empty;
    }

    let values = match method {
        ForecastMethod::Linear => linear_trend(&closes, steps),
        ForecastMethod::Holt { alpha, beta } => holt_trend(&closes, steps, alpha, beta),
    };

    let points = last_date
        .iter_days()
        .skip(1)
        .zip(values)
        .filter(|(_, value)| value.is_finite())
        .map(|(date, value)| ForecastPoint { date, value })
        .collect();

    Forecast { method, points }
}

/// OLS fit of `close = intercept + slope * index`, evaluated past the end
fn linear_trend(closes: &[f64], steps: usize) -> Vec<f64> {
    let n = closes.len() as f64;
    let sum_t: f64 = (0..closes.len()).map(|i| i as f64).sum();
    let sum_y: f64 = closes.iter().sum();
    let sum_t2: f64 = (0..closes.len()).map(|i| (i * i) as f64).sum();
    let sum_ty: f64 = closes.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();

    // n >= 2 with distinct indices, so the denominator is positive.
    let denominator = n * sum_t2 - sum_t * sum_t;
    let slope = (n * sum_ty - sum_t * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_t) / n;

    (0..steps)
        .map(|i| intercept + slope * (closes.len() + i) as f64)
        .collect()
}

/// Holt's linear exponential smoothing
fn holt_trend(closes: &[f64], steps: usize, alpha: f64, beta: f64) -> Vec<f64> {
    let mut level = closes[0];
    let mut trend = closes[1] - closes[0];

    for &y in &closes[1..] {
        let previous_level = level;
        level = alpha * y + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * trend;
    }

    (1..=steps).map(|h| level + h as f64 * trend).collect()
}

/// Computes the configured signal set for a series
#[derive(Debug, Clone)]
pub struct SignalCalculator {
    ma_windows: Vec<usize>,
    pct_change_window: usize,
    forecast_days: usize,
    method: ForecastMethod,
}

impl SignalCalculator {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            ma_windows: config.ma_windows.clone(),
            pct_change_window: config.pct_change_window,
            forecast_days: config.forecast_days,
            method: config.forecast_method,
        }
    }

    pub fn ma_windows(&self) -> &[usize] {
        &self.ma_windows
    }

    pub fn pct_change_window(&self) -> usize {
        self.pct_change_window
    }

    pub fn forecast_days(&self) -> usize {
        self.forecast_days
    }

    /// Signal name of the moving average over `window`
    pub fn ma_key(window: usize) -> String {
        format!("ma{window}")
    }

    /// Signal name of the percent change over `window`
    pub fn pct_change_key(window: usize) -> String {
        format!("pct_change_{window}d")
    }

    /// `last_close`, one `ma{W}` per window, and `pct_change_{W}d`
    pub fn compute(&self, series: &PriceSeries) -> SignalSet {
        let closes = series.closes();
        let mut signals = SignalSet::new();

        signals.insert(
            "last_close",
            closes
                .last()
                .map_or_else(|| insufficient(1, 0), |&c| Signal::checked(c)),
        );
        for &window in &self.ma_windows {
            signals.insert(Self::ma_key(window), simple_moving_average(&closes, window));
        }
        signals.insert(
            Self::pct_change_key(self.pct_change_window),
            percent_change(&closes, self.pct_change_window),
        );

        signals
    }

    pub fn forecast(&self, series: &PriceSeries) -> Forecast {
        forecast(series, self.forecast_days, self.method)
    }
}

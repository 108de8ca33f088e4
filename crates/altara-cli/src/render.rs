//! Text rendering of reports and the market overview

use altara_assistant::JobOutcome;
use altara_market::api::SectorPerformance;
use altara_market::{AnalysisReport, IndexQuote, Signal, TopMovers};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

/// Rows of the price panel shown in the terminal
const PRICE_ROWS: usize = 10;

/// Forecast rows shown; the horizon is sampled evenly
const FORECAST_ROWS: usize = 6;

const UNAVAILABLE: &str = "unavailable";

fn table<H: Into<Cell>>(header: Vec<H>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{v:.2}"))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{v:+.2}%"))
}

fn signal_label(name: &str) -> String {
    if name == "last_close" {
        return "Last close".to_string();
    }
    if let Some(window) = name.strip_prefix("pct_change_").and_then(|s| s.strip_suffix('d')) {
        return format!("{window}-day change");
    }
    if let Some(window) = name.strip_prefix("ma") {
        return format!("{window}-day moving average");
    }
    name.to_string()
}

fn signal_value(name: &str, signal: Signal) -> String {
    if name.starts_with("pct_change_") {
        percent(signal.value())
    } else {
        signal.to_string()
    }
}

/// Assistant reply, or a distinct block saying why there is none
pub fn assistant_block(title: &str, outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Completed { text } => format!("== {title} ==\n{}\n", text.trim()),
        other => format!(
            "== {title}: ASSISTANT UNAVAILABLE ==\n{}\n",
            other.describe()
        ),
    }
}

fn signals_table(report: &AnalysisReport) -> Table {
    let mut table = table(vec!["Signal", "Value"]);
    for (name, signal) in report.signals.iter() {
        table.add_row(vec![signal_label(name), signal_value(name, *signal)]);
    }
    if let Some(last) = report.forecast.last_value() {
        table.add_row(vec![
            format!("{}-day forecast", report.forecast.points.len()),
            format!("{last:.2}"),
        ]);
    }
    table
}

fn fundamentals_table(report: &AnalysisReport) -> Table {
    let f = &report.fundamentals;
    let mut table = table(vec!["Current", "Volume", "52w high", "52w low", "Market cap", "P/E"]);
    table.add_row(vec![
        number(f.current_price),
        f.volume.map_or_else(|| UNAVAILABLE.to_string(), |v| v.to_string()),
        number(f.week_52_high),
        number(f.week_52_low),
        f.market_cap
            .map_or_else(|| UNAVAILABLE.to_string(), |v| format!("${v:.0}M")),
        number(f.pe_ratio),
    ]);
    table
}

fn price_table(report: &AnalysisReport) -> Table {
    let mut header = vec!["Date".to_string(), "Close".to_string()];
    header.extend(report.charts.ma_windows.iter().map(|w| format!("MA{w}")));

    let mut table = table(header);
    for row in report.charts.recent(PRICE_ROWS) {
        let mut cells = vec![row.date.to_string(), format!("{:.2}", row.close)];
        cells.extend(row.moving_averages.iter().map(|ma| number(*ma)));
        table.add_row(cells);
    }
    table
}

fn forecast_table(report: &AnalysisReport) -> Table {
    let points = &report.charts.forecast;
    let step = points.len().div_ceil(FORECAST_ROWS).max(1);

    let mut table = table(vec!["Date", "Forecast"]);
    let mut sampled: Vec<_> = points.iter().step_by(step).collect();
    if let Some(last) = points.last() {
        if sampled.last() != Some(&last) {
            sampled.push(last);
        }
    }
    for point in sampled {
        table.add_row(vec![point.date.to_string(), format!("{:.2}", point.value)]);
    }
    table
}

/// Full text rendering of an analysis report
pub fn report(report: &AnalysisReport) -> String {
    let mut out = format!(
        "=== {} | generated {} ===\n\n",
        report.ticker,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    out.push_str(&format!("{}\n\n", signals_table(report)));
    out.push_str(&format!("{}\n\n", fundamentals_table(report)));

    let context = &report.context;
    out.push_str("== Context ==\n");
    match &context.analyst {
        Some(a) => out.push_str(&format!(
            "Analysts ({}): {} | strong buy {}, buy {}, hold {}, sell {}, strong sell {}\n",
            a.period,
            a.consensus(),
            a.strong_buy,
            a.buy,
            a.hold,
            a.sell,
            a.strong_sell
        )),
        None => out.push_str("Analysts: unavailable\n"),
    }
    match &context.insider {
        Some(i) => out.push_str(&format!(
            "Insiders: {} purchases, {} sales, net {:+} shares\n",
            i.purchases, i.sales, i.net_shares
        )),
        None => out.push_str("Insiders: unavailable\n"),
    }
    out.push_str(&format!("News sentiment: {}\n", number(context.sentiment)));
    out.push_str("Headlines:\n");
    if context.headlines.is_empty() {
        out.push_str("  - no recent headlines\n");
    }
    for headline in &context.headlines {
        out.push_str(&format!("  - {headline}\n"));
    }
    out.push('\n');

    if !report.charts.price.is_empty() {
        out.push_str("== Price & moving averages ==\n");
        out.push_str(&format!("{}\n\n", price_table(report)));
    }
    if !report.charts.forecast.is_empty() {
        out.push_str(&format!("== Forecast ({}) ==\n", report.forecast.method));
        out.push_str(&format!("{}\n\n", forecast_table(report)));
    }

    out.push_str(&assistant_block("AI report", &report.assistant));

    if !report.warnings.is_empty() {
        out.push_str("\n== Data warnings ==\n");
        for warning in &report.warnings {
            out.push_str(&format!("  ! {warning}\n"));
        }
    }

    out
}

pub fn indices(quotes: &[IndexQuote]) -> String {
    let mut table = table(vec!["Index", "Close", "Change"]);
    for quote in quotes {
        table.add_row(vec![
            Cell::new(&quote.name),
            Cell::new(number(quote.close)),
            Cell::new(percent(quote.change_pct)),
        ]);
    }
    table.to_string()
}

pub fn movers(movers: &TopMovers) -> String {
    let mut table = table(vec!["Top gainers", "Change", "Top losers", "Change"]);
    let rows = movers.gainers.len().max(movers.losers.len());
    for i in 0..rows {
        let gainer = movers.gainers.get(i);
        let loser = movers.losers.get(i);
        table.add_row(vec![
            gainer.map_or_else(String::new, |m| m.ticker.to_string()),
            gainer.map_or_else(String::new, |m| percent(Some(m.change_pct))),
            loser.map_or_else(String::new, |m| m.ticker.to_string()),
            loser.map_or_else(String::new, |m| percent(Some(m.change_pct))),
        ]);
    }
    table.to_string()
}

pub fn sectors(sectors: &[SectorPerformance]) -> String {
    let mut table = table(vec!["Sector", "Change"]);
    for sector in sectors {
        table.add_row(vec![sector.sector.clone(), percent(sector.change)]);
    }
    table.to_string()
}

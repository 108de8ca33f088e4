//! Altara command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Credentials (any missing one degrades the matching report section)
//! export OPENAI_API_KEY=...
//! export ASSISTANT_ID=...
//! export FINNHUB_API_KEY=...
//! export NEWS_API_KEY=...
//!
//! altara analyze AAPL --forecast-days 14 --holt
//! altara overview
//! altara repl
//! ```

mod render;
mod repl;

use altara_assistant::CancelToken;
use altara_market::{AnalysisPipeline, ForecastMethod, MarketConfig, MarketOverview};
use altara_utils::Credentials;
use clap::{Parser, Subcommand};
use std::future::Future;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "altara", version)]
#[command(about = "AI-Powered Market Intelligence", long_about = None)]
struct Cli {
    /// Calendar days of price history to fetch
    #[arg(long, global = true)]
    history_days: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one ticker and ask the assistant for a report
    Analyze {
        /// Ticker symbol (case-insensitive)
        ticker: String,

        /// Days to forecast past the last close
        #[arg(long)]
        forecast_days: Option<usize>,

        /// Use Holt exponential smoothing instead of a linear trend
        #[arg(long)]
        holt: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Major indices, top movers, sector performance, and AI stock picks
    Overview {
        /// Skip the AI stock picks
        #[arg(long)]
        no_picks: bool,
    },
    /// Interactive session with a watchlist
    Repl,
}

/// Run `future`; Ctrl-C while it runs fires `cancel` instead of exiting
pub(crate) async fn with_ctrl_c<F: Future>(cancel: &CancelToken, future: F) -> F::Output {
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                cancel.cancel();
            }
        })
    };

    let output = future.await;
    watcher.abort();
    output
}

fn build_config(cli: &Cli, credentials: &Credentials) -> anyhow::Result<MarketConfig> {
    let mut builder = MarketConfig::builder().credentials(credentials);

    if let Some(days) = cli.history_days {
        builder = builder.history_days(days);
    }
    if let Command::Analyze {
        forecast_days, holt, ..
    } = &cli.command
    {
        if let Some(days) = forecast_days {
            builder = builder.forecast_days(*days);
        }
        if *holt {
            builder = builder.forecast_method(ForecastMethod::holt());
        }
    }

    Ok(builder.build()?)
}

async fn analyze(config: MarketConfig, credentials: &Credentials, ticker: &str, json: bool) -> anyhow::Result<()> {
    let pipeline = AnalysisPipeline::from_credentials(config, credentials)?;
    let cancel = CancelToken::new();

    let report = with_ctrl_c(&cancel, pipeline.analyze(ticker, &cancel)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render::report(&report));
    }
    Ok(())
}

async fn overview(config: &MarketConfig, credentials: &Credentials, no_picks: bool) -> anyhow::Result<()> {
    let overview = MarketOverview::from_credentials(config, credentials)?;

    println!("== Market overview ==");
    println!("{}\n", render::indices(&overview.index_summary().await));

    match overview.top_movers().await {
        Ok(movers) => println!("{}\n", render::movers(&movers)),
        Err(e) => println!("Top movers unavailable: {e}\n"),
    }

    match overview.sector_performance().await {
        Ok(sectors) if sectors.is_empty() => println!("Sector performance: no data\n"),
        Ok(sectors) => println!("{}\n", render::sectors(&sectors)),
        Err(e) => println!("Sector performance unavailable: {e}\n"),
    }

    if !no_picks {
        let cancel = CancelToken::new();
        let picks = with_ctrl_c(&cancel, overview.recommendations(&cancel)).await;
        println!("{}", render::assistant_block("AI stock picks", &picks));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    altara_utils::init_tracing();

    let cli = Cli::parse();
    let credentials = Credentials::from_env();
    for name in credentials.missing() {
        warn!("{name} not set, related report sections will be unavailable");
    }

    let config = build_config(&cli, &credentials)?;
    info!(command = ?cli.command, "starting altara");

    match cli.command {
        Command::Analyze { ticker, json, .. } => analyze(config, &credentials, &ticker, json).await,
        Command::Overview { no_picks } => overview(&config, &credentials, no_picks).await,
        Command::Repl => {
            let pipeline = AnalysisPipeline::from_credentials(config, &credentials)?;
            repl::run(&pipeline).await
        }
    }
}

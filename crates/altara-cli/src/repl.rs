//! Interactive session with a session-owned watchlist

use crate::{render, with_ctrl_c};
use altara_assistant::CancelToken;
use altara_market::{AnalysisPipeline, Ticker, Watchlist};
use std::future::Future;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;

const HELP: &str = "\
Commands:
  analyze <TICKER>   analyze one ticker
  analyze            analyze every ticker on the watchlist
  watch <TICKER>     add a ticker to the watchlist
  unwatch <TICKER>   remove a ticker from the watchlist
  list               show the watchlist
  help               show this help
  exit               leave (or Ctrl-D, or Ctrl-C at the prompt)

Ctrl-C during an analysis abandons the assistant job and any remaining
watchlist tickers.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Analyze(Option<String>),
    Watch(String),
    Unwatch(String),
    List,
    Help,
    Exit,
    Unknown(String),
}

impl ReplCommand {
    /// Parse one input line; blank lines are `None`
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?.to_lowercase();
        let argument = words.next().map(str::to_string);

        Some(match (command.as_str(), argument) {
            ("analyze" | "a", argument) => Self::Analyze(argument),
            ("watch" | "w", Some(t)) => Self::Watch(t),
            ("unwatch" | "u", Some(t)) => Self::Unwatch(t),
            ("list" | "ls", None) => Self::List,
            ("help" | "?", _) => Self::Help,
            ("exit" | "quit" | "q", _) => Self::Exit,
            _ => Self::Unknown(line.trim().to_string()),
        })
    }
}

/// Apply a watch command to the session's watchlist
pub fn watch(watchlist: &mut Watchlist, raw: &str) -> String {
    match Ticker::parse(raw) {
        Ok(ticker) => {
            let message = format!("added {ticker}");
            if watchlist.add(ticker.clone()) {
                message
            } else {
                format!("{ticker} is already on the watchlist")
            }
        }
        Err(e) => e.to_string(),
    }
}

/// Apply an unwatch command to the session's watchlist
pub fn unwatch(watchlist: &mut Watchlist, raw: &str) -> String {
    match Ticker::parse(raw) {
        Ok(ticker) if watchlist.remove(&ticker) => format!("removed {ticker}"),
        Ok(ticker) => format!("{ticker} is not on the watchlist"),
        Err(e) => e.to_string(),
    }
}

pub fn list(watchlist: &Watchlist) -> String {
    if watchlist.is_empty() {
        return "watchlist is empty".to_string();
    }
    watchlist
        .iter()
        .map(Ticker::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run `analyze_one` over `tickers` in order, stopping once `cancel` fires.
///
/// Returns how many tickers were started.
async fn for_each_until_cancelled<'a, F, Fut>(
    tickers: &'a [Ticker],
    cancel: &CancelToken,
    mut analyze_one: F,
) -> usize
where
    F: FnMut(&'a Ticker) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut started = 0;
    for ticker in tickers {
        if cancel.is_cancelled() {
            println!("skipping {} remaining ticker(s)", tickers.len() - started);
            break;
        }
        started += 1;
        analyze_one(ticker).await;
    }
    started
}

/// Analyze tickers under one cancel token shared by the whole batch
async fn analyze(pipeline: &AnalysisPipeline, tickers: &[Ticker]) {
    let cancel = CancelToken::new();
    let token = &cancel;
    let batch = for_each_until_cancelled(tickers, token, move |ticker| async move {
        match pipeline.analyze_ticker(ticker, token).await {
            Ok(report) => println!("{}", render::report(&report)),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    });
    with_ctrl_c(&cancel, batch).await;
}

/// Read stdin lines on a dedicated thread so the prompt can also wait for Ctrl-C
fn spawn_line_reader() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run the read-eval-print loop until `exit` or end of input
pub async fn run(pipeline: &AnalysisPipeline) -> anyhow::Result<()> {
    let mut watchlist = Watchlist::new();
    let mut lines = spawn_line_reader();
    let mut stdout = io::stdout();

    println!("Altara - AI-Powered Market Intelligence");
    println!("Type `help` for commands.\n");

    loop {
        print!("altara> ");
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!();
                break;
            }
        };
        let input = match line {
            Some(Ok(input)) => input,
            Some(Err(e)) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
            None => {
                println!();
                break;
            }
        };

        let Some(command) = ReplCommand::parse(&input) else {
            continue;
        };

        match command {
            ReplCommand::Analyze(Some(raw)) => match Ticker::parse(&raw) {
                Ok(ticker) => analyze(pipeline, &[ticker]).await,
                Err(e) => eprintln!("Error: {e}\n"),
            },
            ReplCommand::Analyze(None) if watchlist.is_empty() => {
                println!("watchlist is empty; use `analyze <TICKER>` or `watch <TICKER>`");
            }
            ReplCommand::Analyze(None) => {
                let tickers: Vec<Ticker> = watchlist.iter().cloned().collect();
                analyze(pipeline, &tickers).await;
            }
            ReplCommand::Watch(raw) => println!("{}", watch(&mut watchlist, &raw)),
            ReplCommand::Unwatch(raw) => println!("{}", unwatch(&mut watchlist, &raw)),
            ReplCommand::List => println!("{}", list(&watchlist)),
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Exit => break,
            ReplCommand::Unknown(line) => println!("unknown command: {line} (try `help`)"),
        }
    }

    println!("Goodbye!");
    Ok(())
}

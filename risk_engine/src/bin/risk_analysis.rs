//! `risk-analysis`: print one JSON risk document for a ticker.
//!
//! Stdout carries only the document; logs go to stderr and honour
//! `RUST_LOG`. The process exits non-zero only if not even an error
//! document could be written.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use market_data_ingestor::{models::period::Lookback, providers::alpaca_rest::AlpacaProvider};
use risk_engine::{RiskAnalyzer, RiskConfig, report::AnalysisDocument};
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(version, about = "Volatility risk analysis for a single ticker")]
struct Cli {
    /// Ticker symbol, e.g. AAPL
    #[arg(long)]
    ticker: String,

    /// JSON array of tickers already held, e.g. '["AAPL","MSFT"]'
    #[arg(long, default_value = "[]")]
    portfolio: String,

    /// TOML settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Lookback period such as 1y, 6mo or 5d
    #[arg(long)]
    period: Option<Lookback>,
}

fn parse_portfolio(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(%err, "ignoring malformed portfolio");
        Vec::new()
    })
}

fn run(cli: &Cli, ticker: &str) -> Result<AnalysisDocument> {
    let mut cfg = match &cli.config {
        Some(path) => RiskConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RiskConfig::default().with_env_overrides(),
    };
    if let Some(period) = cli.period {
        cfg.lookback = period;
    }

    let provider = AlpacaProvider::new().context("initialising market data provider")?;
    let mut analyzer = RiskAnalyzer::new(&cfg, Box::new(provider))?;

    let portfolio = parse_portfolio(&cli.portfolio);
    let outcome = analyzer.analyze(ticker, &portfolio);
    debug!(portfolio = ?outcome.portfolio, decisions = ?outcome.decisions, "analysis finished");
    Ok(outcome.report)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("risk_engine=info,market_data_ingestor=info")),
        )
        .init();

    let cli = Cli::parse();
    let ticker = cli.ticker.trim().to_uppercase();

    let doc = run(&cli, &ticker).unwrap_or_else(|err| {
        error!(ticker = %ticker, error = format!("{err:#}"), "risk analysis could not start");
        AnalysisDocument::error(&ticker, format!("{err:#}"), Local::now())
    });

    match doc.to_json() {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "failed to serialise result document");
            ExitCode::FAILURE
        }
    }
}

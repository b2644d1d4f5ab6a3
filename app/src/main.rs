// In app/src/main.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::ApiClient;
use app_config::Settings;
use backtester::{BacktestSettings, Backtester};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use core_types::{PlannedOrder, Ticker};
use database::{Db, HistoricalStore, LIVE_LEDGER, Ledger, MemoryLedger};
use engine::Planner;
use execution::{LiveSource, MarketGateway, ReplaySource};
use risk::FeeSchedule;
use tokio::task;
use tracing_subscriber::prelude::*;

mod import;
mod strategy_factory;

use crate::strategy_factory::{create_fee_schedule, create_risk_manager, create_strategy};

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Darvas box breakout backtester and daily trade planner.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replays the strategy over stored daily prices and prints the report.
    Backtest {
        /// First trading day, YYYY-MM-DD.
        #[arg(long)]
        start_date: NaiveDate,

        /// Last trading day, YYYY-MM-DD.
        #[arg(long)]
        end_date: NaiveDate,

        /// Restrict the run to these tickers. Repeatable; defaults to every stored ticker.
        #[arg(long = "ticker")]
        tickers: Vec<String>,
    },

    /// Settles triggered stops and plans orders for the next trading day.
    Plan {
        /// The day to plan from. Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Places the trading plan stored for a day.
    Execute {
        /// The day whose plan to execute. Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Loads daily price bars from a CSV file into the database.
    Import {
        /// CSV with a `date,ticker,open,high,low,close,volume` header.
        #[arg(short, long)]
        file: std::path::PathBuf,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    let cli = Cli::parse();

    tracing::info!(environment = %settings.app.environment, "Starting darvas");

    match cli.command {
        Commands::Backtest { start_date, end_date, tickers } => {
            handle_backtest(settings, start_date, end_date, tickers).await?;
        }
        Commands::Plan { date } => {
            handle_plan(settings, date.unwrap_or_else(today)).await?;
        }
        Commands::Execute { date } => {
            handle_execute(settings, date.unwrap_or_else(today)).await?;
        }
        Commands::Import { file } => {
            handle_import(settings, &file).await?;
        }
    }

    tracing::info!("darvas has finished successfully.");
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// --- "Backtest" Subcommand Logic ---

async fn handle_backtest(
    settings: Settings,
    start_date: NaiveDate,
    end_date: NaiveDate,
    tickers: Vec<String>,
) -> Result<()> {
    let tickers: Vec<Ticker> = tickers.into_iter().map(Ticker::new).collect();

    let runner = Backtester::new(
        Box::new(create_strategy(&settings)?),
        Box::new(create_risk_manager(&settings)?),
        BacktestSettings {
            starting_cash: settings.simulation.starting_cash()?,
            capital_gains_tax_rate: settings.simulation.capital_gains_tax_rate()?,
        },
    );

    let db = database::connect(&settings.database).await?;
    tracing::info!("Loading historical data for backtest...");
    let store = db.load_price_bars(&tickers, end_date).await?;
    tracing::info!(bars = store.len(), "Historical data loaded.");

    // The simulation is synchronous; keep it off the async workers.
    let report = task::spawn_blocking(move || {
        let mut ledger = MemoryLedger::new(runner.settings.starting_cash);
        runner.run(&store, &mut ledger, &tickers, start_date, end_date)
    })
    .await??;

    backtester::print_report(&report);

    let run_id = db.save_simulation_report(start_date, end_date, &report).await?;
    tracing::info!(run_id, "Backtest report saved.");
    Ok(())
}

// --- Live Cycle Logic ---

fn create_gateway(settings: &Settings, store: Arc<HistoricalStore>, fees: FeeSchedule) -> Result<Box<dyn MarketGateway>> {
    if settings.app.live_trading_enabled {
        tracing::warn!("LIVE TRADING IS ENABLED. REAL ORDERS WILL BE PLACED.");
        let api_client = ApiClient::new(&settings.broker)?;
        Ok(Box::new(LiveSource::new(api_client, fees)))
    } else {
        tracing::info!("Live trading disabled. Replaying stored prices.");
        Ok(Box::new(ReplaySource::new(store, fees)))
    }
}

fn create_planner(settings: &Settings, store: Arc<HistoricalStore>) -> Result<Planner> {
    let gateway = create_gateway(settings, store, create_fee_schedule(settings)?)?;
    Ok(Planner::new(
        Box::new(create_strategy(settings)?),
        Box::new(create_risk_manager(settings)?),
        gateway,
    ))
}

async fn load_live_ledger(db: &Db, settings: &Settings) -> Result<MemoryLedger> {
    match db.load_ledger(LIVE_LEDGER).await? {
        Some(ledger) => Ok(ledger),
        None => {
            let starting_cash = settings.simulation.starting_cash()?;
            tracing::info!(%starting_cash, "No live ledger yet. Starting a fresh one.");
            Ok(MemoryLedger::new(starting_cash))
        }
    }
}

async fn handle_plan(settings: Settings, date: NaiveDate) -> Result<()> {
    let tickers = app_config::load_watchlist()?.tickers();
    if tickers.is_empty() {
        anyhow::bail!("Cannot plan: the watchlist has no enabled tickers.");
    }
    let tomorrow = date.succ_opt().context("date out of range")?;

    let db = database::connect(&settings.database).await?;
    // Replay reads tomorrow's open from the store; the engine itself only looks before it.
    let store = Arc::new(db.load_price_bars(&tickers, tomorrow).await?);
    let planner = create_planner(&settings, store.clone())?;
    let mut ledger = load_live_ledger(&db, &settings).await?;

    let outcome = planner.plan(&*store, &mut ledger, &tickers, date).await;
    // Settled stops and logged events are kept even if planning failed part way.
    db.save_ledger(LIVE_LEDGER, &ledger).await?;
    let plans = outcome?;

    db.save_trading_plan(tomorrow, &plans).await?;
    print_plan(tomorrow, &plans);
    Ok(())
}

async fn handle_execute(settings: Settings, date: NaiveDate) -> Result<()> {
    let db = database::connect(&settings.database).await?;
    let plans = db.load_trading_plan(date).await?;
    if plans.is_empty() {
        tracing::info!(%date, "No trading plan for this day.");
        return Ok(());
    }

    let tickers: Vec<Ticker> = plans.iter().map(|p| p.ticker.clone()).collect();
    let store = Arc::new(db.load_price_bars(&tickers, date).await?);
    let planner = create_planner(&settings, store)?;
    let mut ledger = load_live_ledger(&db, &settings).await?;

    let outcome = planner.execute(&mut ledger, date, &plans).await;
    db.save_ledger(LIVE_LEDGER, &ledger).await?;
    let summary = outcome?;
    let wallet_cash = ledger.wallet_cash()?;

    println!(
        "Executed plan for {date}: {} buys, {} stop-loss updates, {} skipped. Wallet cash {:.2}",
        summary.buys,
        summary.stop_updates,
        summary.skipped,
        wallet_cash
    );
    Ok(())
}

fn print_plan(date: NaiveDate, plans: &[PlannedOrder]) {
    println!("\n--- Trading Plan for {date} ---");
    if plans.is_empty() {
        println!("No orders.");
        return;
    }
    for order in plans {
        let qty = order.qty.map(|q| q.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  - {:<16} {:<10} qty = {:>6}, stop = {:.4}",
            order.kind.as_str(),
            order.ticker,
            qty,
            order.stop_loss
        );
    }
}

// --- "Import" Subcommand Logic ---

async fn handle_import(settings: Settings, file: &std::path::Path) -> Result<()> {
    let reader = std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let bars = import::read_price_bars(reader)?;
    tracing::info!(rows = bars.len(), file = %file.display(), "Parsed price file. Inserting into database.");

    let db = database::connect(&settings.database).await?;
    let inserted = db.insert_price_bars(&bars).await?;
    tracing::info!(inserted, "Import complete.");
    Ok(())
}

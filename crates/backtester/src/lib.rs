// In crates/backtester/src/lib.rs

pub mod error;
pub mod logger;
pub mod types;

use std::collections::BTreeMap;
use std::time::Instant;

use analytics::{AnalyticsEngine, PerformanceReport, ReportInput};
use chrono::NaiveDate;
use core_types::{Decision, Position, PriceBar, Ticker, Transaction, TxnType};
use database::{Ledger, PriceSource};
use events::{EventRecord, LedgerEvent};
use risk::RiskManager;
use rust_decimal::Decimal;
use strategies::{DecisionRequest, Strategy};
use tracing::{debug, error, info};

pub use error::{Error, Result};
pub use logger::RunLog;
pub use types::BacktestSettings;

/// Replays the decision engine day by day over historical prices.
pub struct Backtester {
    pub strategy: Box<dyn Strategy>,
    pub risk_manager: Box<dyn RiskManager>,
    pub settings: BacktestSettings,
}

impl Backtester {
    pub fn new(
        strategy: Box<dyn Strategy>,
        risk_manager: Box<dyn RiskManager>,
        settings: BacktestSettings,
    ) -> Self {
        Self { strategy, risk_manager, settings }
    }

    /// Runs every ticker over `[start, end]` against `ledger` and reports the outcome.
    ///
    /// An empty `tickers` slice simulates every ticker the price source knows.
    /// The ledger is expected to start with `settings.starting_cash` in the wallet.
    pub fn run(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        tickers: &[Ticker],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PerformanceReport> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        let started = Instant::now();

        let mut tickers = if tickers.is_empty() { prices.tickers()? } else { tickers.to_vec() };
        tickers.sort();
        tickers.dedup();
        let dates = prices.trading_dates(start, end)?;

        info!(
            strategy = self.strategy.name(),
            risk_manager = self.risk_manager.name(),
            tickers = tickers.len(),
            trading_days = dates.len(),
            %start,
            %end,
            "Starting backtest"
        );

        let mut log = RunLog::new();
        for ticker in &tickers {
            for &date in &dates {
                if let Err(e) = self.step(prices, ledger, ticker, date, &mut log) {
                    error!(%ticker, %date, error = %e, "Backtest aborted");
                    if let Err(log_err) = ledger.log_event(EventRecord::error(date, ticker.clone(), e.to_string())) {
                        error!(%ticker, %date, error = %log_err, "Failed to record the abort in the ledger");
                    }
                    return Err(e);
                }
            }
        }

        let mut last_closes = BTreeMap::new();
        for ticker in &tickers {
            let last_close = match end.succ_opt() {
                Some(after_end) => prices.prev_close(ticker, after_end)?,
                None => prices.last_bar(ticker)?.map(|bar| bar.close),
            };
            if let Some(close) = last_close {
                last_closes.insert(ticker.clone(), close);
            }
        }

        let transactions = ledger.transactions()?;
        let positions = ledger.positions()?;
        let report = AnalyticsEngine::new().calculate(&ReportInput {
            starting_cash: self.settings.starting_cash,
            wallet_cash: ledger.wallet_cash()?,
            capital_gains_tax_rate: self.settings.capital_gains_tax_rate,
            transactions: &transactions,
            positions: &positions,
            last_closes: &last_closes,
            tickers_simulated: tickers.len(),
            duration: started.elapsed(),
        });

        info!(?log, portfolio_value = %report.portfolio_value, "Backtest finished");
        Ok(report)
    }

    /// One ticker on one trading day.
    fn step(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        ticker: &Ticker,
        date: NaiveDate,
        log: &mut RunLog,
    ) -> Result<()> {
        let Some(bar) = prices.bar(ticker, date)? else {
            return Ok(());
        };

        // The day's low is the worst price the position could have seen.
        if let Some(position) = ledger.position(ticker)? {
            if bar.low <= position.stop_loss {
                return self.stop_out(ledger, &position, &bar, log);
            }
        }

        let loss_occurred = ledger.take_loss_pending(ticker)?;
        let request = DecisionRequest {
            ticker: ticker.clone(),
            trade_date: date,
            open_price: bar.open,
            loss_occurred,
        };
        let decision = self.strategy.decide(prices, ledger, &request)?;
        log.record_decision(&decision);

        match decision {
            Decision::NoOp => {
                debug!(%ticker, %date, open = %bar.open, "NO_OP");
                Ok(())
            }
            Decision::Buy { stop_loss } => self.buy(ledger, &bar, stop_loss, log),
            Decision::Sell { price } => self.sell(ledger, &bar, price, log),
            Decision::UpdateStopLoss { stop_loss } => self.update_stop_loss(ledger, &bar, stop_loss, log),
        }
    }

    fn record(&self, ledger: &mut dyn Ledger, log: &mut RunLog, event: EventRecord) -> Result<()> {
        log.record_event(&event);
        ledger.record_event(event)?;
        Ok(())
    }

    fn buy(&self, ledger: &mut dyn Ledger, bar: &PriceBar, stop_loss: Decimal, log: &mut RunLog) -> Result<()> {
        let held = ledger.position(&bar.ticker)?;
        let wallet_cash = ledger.wallet_cash()?;

        let order = match self.risk_manager.size_buy(bar.open, stop_loss, wallet_cash, held.as_ref()) {
            Ok(Some(order)) => order,
            Ok(None) => {
                let message = format!(
                    "Insufficient wallet cash ({:.2}) to buy at {:.2}",
                    wallet_cash, bar.open
                );
                return self.record(ledger, log, EventRecord::warning(bar.date, bar.ticker.clone(), message));
            }
            Err(risk::Error::Vetoed { reason }) => {
                return self.record(ledger, log, EventRecord::warning(bar.date, bar.ticker.clone(), reason));
            }
            Err(e) => return Err(e.into()),
        };

        let wallet_cash = wallet_cash - order.total_cost;
        ledger.set_wallet_cash(wallet_cash)?;
        ledger.open_position(Position {
            ticker: bar.ticker.clone(),
            qty: order.qty,
            buy_price: order.price,
            stop_loss,
            buy_date: bar.date,
        })?;
        ledger.record_transaction(Transaction {
            date: bar.date,
            ticker: bar.ticker.clone(),
            txn_type: TxnType::Buy,
            price: order.price,
            qty: order.qty,
        })?;

        self.record(
            ledger,
            log,
            EventRecord::new(
                bar.date,
                bar.ticker.clone(),
                LedgerEvent::Bought {
                    qty: order.qty,
                    price: order.price,
                    fees: order.fees,
                    total_cost: order.total_cost,
                    stop_loss,
                    wallet_cash,
                },
            ),
        )
    }

    /// Closes the whole position at `price` and credits the wallet.
    fn sell(&self, ledger: &mut dyn Ledger, bar: &PriceBar, price: Decimal, log: &mut RunLog) -> Result<()> {
        let position = match ledger.position(&bar.ticker)? {
            Some(position) if position.qty > 0 => position,
            _ => {
                return Err(Error::NoPositionToSell { ticker: bar.ticker.clone(), date: bar.date });
            }
        };

        let trade_value = price * Decimal::from(position.qty);
        let fees = self.risk_manager.fee_schedule().charges(trade_value, false);
        let net_proceeds = trade_value - fees;
        let pnl = net_proceeds - position.cost_basis();

        let wallet_cash = ledger.wallet_cash()? + net_proceeds;
        ledger.set_wallet_cash(wallet_cash)?;
        ledger.close_position(&bar.ticker)?;
        ledger.record_transaction(Transaction {
            date: bar.date,
            ticker: bar.ticker.clone(),
            txn_type: TxnType::Sell,
            price,
            qty: position.qty,
        })?;
        if pnl < Decimal::ZERO {
            ledger.set_loss_pending(&bar.ticker)?;
        }

        self.record(
            ledger,
            log,
            EventRecord::new(
                bar.date,
                bar.ticker.clone(),
                LedgerEvent::Sold { qty: position.qty, price, fees, net_proceeds, pnl, wallet_cash },
            ),
        )
    }

    fn stop_out(&self, ledger: &mut dyn Ledger, position: &Position, bar: &PriceBar, log: &mut RunLog) -> Result<()> {
        self.record(
            ledger,
            log,
            EventRecord::new(
                bar.date,
                bar.ticker.clone(),
                LedgerEvent::StopLossTriggered { stop_loss: position.stop_loss, low: bar.low },
            ),
        )?;
        self.sell(ledger, bar, position.stop_loss, log)
    }

    fn update_stop_loss(
        &self,
        ledger: &mut dyn Ledger,
        bar: &PriceBar,
        stop_loss: Decimal,
        log: &mut RunLog,
    ) -> Result<()> {
        let Some(position) = ledger.position(&bar.ticker)?.filter(|p| p.qty > 0) else {
            let message = format!("No position to move the stop-loss to {:.4}", stop_loss);
            return self.record(ledger, log, EventRecord::warning(bar.date, bar.ticker.clone(), message));
        };

        ledger.set_stop_loss(&bar.ticker, stop_loss)?;
        self.record(
            ledger,
            log,
            EventRecord::new(
                bar.date,
                bar.ticker.clone(),
                LedgerEvent::StopLossUpdated { from: position.stop_loss, to: stop_loss },
            ),
        )
    }
}

/// Helper function to print the performance report in a readable format.
pub fn print_report(report: &PerformanceReport) {
    println!("\n--- Backtest Performance Report ---");
    println!("-----------------------------------");
    println!("Starting Cash:         {:.2}", report.starting_cash);
    println!("Wallet Cash:           {:.2}", report.wallet_cash);
    println!("Open Positions Value:  {:.2}", report.open_position_value);
    println!("Portfolio Value:       {:.2}", report.portfolio_value);
    println!("Invested Cost Basis:   {:.2}", report.invested_cost_basis);
    println!("-----------------------------------");
    println!("Realized Gains:        {:.2}", report.realized_gains);
    println!("Capital Gains Tax:     {:.2}", report.capital_gains_tax);
    println!("After-Tax Value:       {:.2}", report.after_tax_value);
    println!("Total Return:          {:.2} ({:.2}%)", report.total_return, report.total_return_pct);
    println!(
        "Return on Start Cash:  {:.2} ({:.2}%)",
        report.return_on_starting_cash, report.return_on_starting_cash_pct
    );
    println!("-----------------------------------");
    println!("Round Trips:           {}", report.round_trips);
    println!("Win Rate:              {:.2}%", report.win_rate);
    println!("Gross Profit / Loss:   {:.2} / {:.2}", report.gross_profit, report.gross_loss);
    for summary in &report.transactions {
        println!(
            "  - {:<4}: count = {}, value = {:.2}",
            summary.txn_type, summary.count, summary.total_value
        );
    }
    println!("-----------------------------------");

    if !report.positions.is_empty() {
        println!("Open Positions:");
        for p in &report.positions {
            let last_close = p
                .last_close
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  - {}: qty = {}, buy = {:.2}, stop = {:.4}, last close = {}, value = {:.2}, unrealized = {:.2}",
                p.ticker, p.qty, p.buy_price, p.stop_loss, last_close, p.market_value, p.unrealized_pnl
            );
        }
        println!("-----------------------------------");
    }

    println!(
        "Tickers Simulated:     {} in {:.2}s",
        report.tickers_simulated,
        report.duration_ms as f64 / 1000.0
    );
}

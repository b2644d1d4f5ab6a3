// In crates/analytics/src/types.rs

use chrono::NaiveDate;
use core_types::{Position, Ticker, Transaction, TxnType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Final ledger state handed to the analytics engine.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub starting_cash: Decimal,
    pub wallet_cash: Decimal,
    /// Flat rate applied to net positive realized gains.
    pub capital_gains_tax_rate: Decimal,
    pub transactions: &'a [Transaction],
    pub positions: &'a [Position],
    /// Last known close per ticker, used to mark open positions.
    pub last_closes: &'a BTreeMap<Ticker, Decimal>,
    pub tickers_simulated: usize,
    pub duration: Duration,
}

/// A SELL matched to the BUY that opened it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub ticker: Ticker,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub qty: u64,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Gross of fees.
    pub pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnSummary {
    pub txn_type: TxnType,
    pub count: usize,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDetail {
    pub ticker: Ticker,
    pub qty: u64,
    pub buy_price: Decimal,
    pub stop_loss: Decimal,
    /// `None` when the ticker has no price history at all. Such a position is marked at zero.
    pub last_close: Option<Decimal>,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
}

/// A comprehensive report of a strategy's performance over a backtest period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceReport {
    pub starting_cash: Decimal,
    pub wallet_cash: Decimal,
    pub open_position_value: Decimal,
    /// Wallet cash plus open positions at their last close.
    pub portfolio_value: Decimal,
    pub invested_cost_basis: Decimal,

    pub realized_gains: Decimal,
    pub capital_gains_tax: Decimal,
    pub after_tax_value: Decimal,
    /// After-tax value less the cost basis of open positions.
    pub total_return: Decimal,
    /// `total_return` as a percentage of the open cost basis; zero when nothing is invested.
    pub total_return_pct: Decimal,
    pub return_on_starting_cash: Decimal,
    pub return_on_starting_cash_pct: Decimal,

    pub transactions: Vec<TxnSummary>,
    pub positions: Vec<PositionDetail>,

    pub round_trips: u32,
    pub winning_trips: u32,
    pub win_rate: f64,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,

    pub tickers_simulated: usize,
    pub duration_ms: u64,
}

impl PerformanceReport {
    /// Creates a new, empty report with zero values.
    pub fn new() -> Self {
        Self::default()
    }
}

// In crates/core-types/src/types.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of fractional digits kept on every emitted stop-loss price.
pub const PRICE_DECIMALS: u32 = 4;

/// Rounds a price to the ledger precision.
pub fn round_price(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(PRICE_DECIMALS);
    rounded.rescale(PRICE_DECIMALS);
    rounded
}

/// An exchange ticker symbol, e.g. "RELIANCE".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(pub String);

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One daily OHLCV row for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Not every data vendor reports volume for every day.
    pub volume: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnType {
    Buy,
    Sell,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Buy => "BUY",
            TxnType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TxnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(TxnType::Buy),
            "SELL" => Ok(TxnType::Sell),
            other => Err(Error::UnknownTxnType(other.to_string())),
        }
    }
}

/// An append-only audit record of a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub txn_type: TxnType,
    pub price: Decimal,
    pub qty: u64,
}

impl Transaction {
    /// Gross traded value, before fees.
    pub fn value(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

/// The single open holding for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: Ticker,
    pub qty: u64,
    pub buy_price: Decimal,
    pub stop_loss: Decimal,
    pub buy_date: NaiveDate,
}

impl Position {
    pub fn cost_basis(&self) -> Decimal {
        self.buy_price * Decimal::from(self.qty)
    }
}

/// A Darvas consolidation range anchored to a historical close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarvasBox {
    /// Assigned by the ledger when the box is opened. Zero until then.
    pub id: u64,
    pub ticker: Ticker,
    pub start_date: NaiveDate,
    /// `None` while the box is still being extended.
    pub end_date: Option<NaiveDate>,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub base_close: Decimal,
    pub active: bool,
}

impl DarvasBox {
    /// Builds an active box of `height` (a fraction, e.g. 0.01) around `base_close`.
    pub fn anchored(ticker: Ticker, start_date: NaiveDate, base_close: Decimal, height: Decimal) -> Self {
        Self {
            id: 0,
            ticker,
            start_date,
            end_date: None,
            min_price: base_close * (dec!(1) - height),
            max_price: base_close * (dec!(1) + height),
            base_close,
            active: true,
        }
    }

    /// Boundary prices count as inside the box.
    pub fn contains(&self, price: Decimal) -> bool {
        self.min_price <= price && price <= self.max_price
    }

    pub fn is_breakout(&self, price: Decimal) -> bool {
        price > self.max_price
    }

    pub fn is_breakdown(&self, price: Decimal) -> bool {
        price < self.min_price
    }
}

/// The action the decision engine emits for one ticker on one day.
///
/// Actions that open or protect a position always carry their stop-loss, so a
/// BUY without a stop cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    NoOp,
    Buy { stop_loss: Decimal },
    UpdateStopLoss { stop_loss: Decimal },
    Sell { price: Decimal },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::NoOp => "NO_OP",
            Decision::Buy { .. } => "BUY",
            Decision::UpdateStopLoss { .. } => "UPDATE_STOP_LOSS",
            Decision::Sell { .. } => "SELL",
        }
    }

    pub fn stop_loss(&self) -> Option<Decimal> {
        match self {
            Decision::Buy { stop_loss } | Decision::UpdateStopLoss { stop_loss } => Some(*stop_loss),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop_loss() {
            Some(stop) => write!(f, "{} (stop {})", self.label(), stop),
            None => f.write_str(self.label()),
        }
    }
}

/// The kind of order the live planner schedules for the next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanKind {
    Buy,
    UpdateStopLoss,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Buy => "BUY",
            PlanKind::UpdateStopLoss => "UPDATE_STOP_LOSS",
        }
    }
}

impl FromStr for PlanKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(PlanKind::Buy),
            "UPDATE_STOP_LOSS" => Ok(PlanKind::UpdateStopLoss),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

/// A single row of a trading plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOrder {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub kind: PlanKind,
    /// Only BUY orders carry a quantity.
    pub qty: Option<u64>,
    pub stop_loss: Decimal,
}

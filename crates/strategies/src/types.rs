// In crates/strategies/src/types.rs

use chrono::NaiveDate;
use core_types::Ticker;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DarvasSettings {
    /// Prior trading days the leader gate looks back over. Zero disables the gate.
    pub leader_lookback_days: u32,
    /// Consecutive breakouts needed before a BUY.
    pub breakout_streak: u32,
    /// Box height as a fraction of the anchor close.
    pub default_height: Decimal,
    /// Added to a ticker's box height after each losing exit.
    pub height_increment: Decimal,
}

/// Inputs for one ticker on one trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub ticker: Ticker,
    pub trade_date: NaiveDate,
    pub open_price: Decimal,
    /// The ticker's previous position closed at a loss.
    pub loss_occurred: bool,
}

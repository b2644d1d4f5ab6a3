// In crates/execution/src/types.rs

use core_types::Ticker;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A filled BUY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub ticker: Ticker,
    pub qty: u64,
    pub price: Decimal,
    pub fees: Decimal,
    /// Trade value plus fees.
    pub total_cost: Decimal,
}

/// Whether a position's protective stop has been hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLossStatus {
    pub triggered: bool,
    /// Net sale proceeds when triggered.
    pub amount: Option<Decimal>,
    /// Fill price when triggered.
    pub price: Option<Decimal>,
}

impl StopLossStatus {
    pub fn untriggered() -> Self {
        Self { triggered: false, amount: None, price: None }
    }

    pub fn triggered(price: Decimal, amount: Decimal) -> Self {
        Self { triggered: true, amount: Some(amount), price: Some(price) }
    }
}

// In crates/risk/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::FeeSchedule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleRiskSettings {
    /// The most a single BUY may spend, fees included.
    pub max_invest_per_stock: Decimal,
    #[serde(default)]
    pub fees: FeeSchedule,
}

/// A BUY sized against the available budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub qty: u64,
    pub price: Decimal,
    pub fees: Decimal,
    /// Trade value plus fees; what the wallet is debited.
    pub total_cost: Decimal,
    pub stop_loss: Decimal,
}

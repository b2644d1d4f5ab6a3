// In crates/risk/src/simple_manager.rs

use crate::types::{BuyOrder, SimpleRiskSettings};
use crate::{Error, FeeSchedule, Result, RiskManager};
use core_types::Position;
use rust_decimal::Decimal;

/// Sizes every BUY to the smaller of the wallet and a fixed per-stock cap.
#[derive(Debug, Clone)]
pub struct SimpleRiskManager {
    settings: SimpleRiskSettings,
}

impl SimpleRiskManager {
    pub fn new(settings: SimpleRiskSettings) -> Self {
        Self { settings }
    }
}

impl RiskManager for SimpleRiskManager {
    fn name(&self) -> &'static str {
        "SimpleRiskManager"
    }

    fn fee_schedule(&self) -> &FeeSchedule {
        &self.settings.fees
    }

    fn size_buy(
        &self,
        price: Decimal,
        stop_loss: Decimal,
        wallet_cash: Decimal,
        open_position: Option<&Position>,
    ) -> Result<Option<BuyOrder>> {
        // Rule: Veto if a position is already open. (No pyramiding.)
        if open_position.is_some() {
            return Err(Error::Vetoed {
                reason: "A position is already open for this ticker.".to_string(),
            });
        }

        if wallet_cash <= Decimal::ZERO {
            return Err(Error::Vetoed {
                reason: format!("Wallet cash ({:.2}) is not positive", wallet_cash),
            });
        }

        let budget = wallet_cash.min(self.settings.max_invest_per_stock);
        let qty = self.settings.fees.max_affordable_quantity(budget, price);
        if qty == 0 {
            return Ok(None);
        }

        let trade_value = price * Decimal::from(qty);
        let fees = self.settings.fees.charges(trade_value, true);

        Ok(Some(BuyOrder {
            qty,
            price,
            fees,
            total_cost: trade_value + fees,
            stop_loss,
        }))
    }
}

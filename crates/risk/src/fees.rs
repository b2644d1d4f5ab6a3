// In crates/risk/src/fees.rs

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Per-trade charges, each expressed as a fraction of trade value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub brokerage_rate: Decimal,
    pub brokerage_min: Decimal,
    pub brokerage_max: Decimal,
    /// Securities transaction tax, charged on both sides.
    pub stt_rate: Decimal,
    pub turnover_rate: Decimal,
    /// Charged on buys only.
    pub stamp_duty_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            brokerage_rate: dec!(0.001),
            brokerage_min: dec!(5),
            brokerage_max: dec!(20),
            stt_rate: dec!(0.001),
            turnover_rate: dec!(0.000001),
            stamp_duty_rate: dec!(0.001),
        }
    }
}

impl FeeSchedule {
    /// Applies named overrides on top of the schedule.
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a str, Decimal)>,
    ) -> Result<Self> {
        for (name, value) in overrides {
            if value.is_sign_negative() {
                return Err(Error::InvalidParameters(format!("fee '{name}' must not be negative")));
            }
            let slot = match name {
                "brokerage_rate" => &mut self.brokerage_rate,
                "brokerage_min" => &mut self.brokerage_min,
                "brokerage_max" => &mut self.brokerage_max,
                "stt_rate" => &mut self.stt_rate,
                "turnover_rate" => &mut self.turnover_rate,
                "stamp_duty_rate" => &mut self.stamp_duty_rate,
                other => return Err(Error::InvalidParameters(format!("unknown fee '{other}'"))),
            };
            *slot = value;
        }
        if self.brokerage_min > self.brokerage_max {
            return Err(Error::InvalidParameters(format!(
                "brokerage_min ({}) exceeds brokerage_max ({})",
                self.brokerage_min, self.brokerage_max
            )));
        }
        Ok(self)
    }

    /// Total charges for a trade of `trade_value`.
    pub fn charges(&self, trade_value: Decimal, is_buy: bool) -> Decimal {
        let brokerage = (self.brokerage_rate * trade_value).clamp(self.brokerage_min, self.brokerage_max);
        let stt = self.stt_rate * trade_value;
        let turnover = self.turnover_rate * trade_value;
        let stamp_duty = if is_buy { self.stamp_duty_rate * trade_value } else { Decimal::ZERO };
        brokerage + stt + turnover + stamp_duty
    }

    /// Largest quantity whose value plus buy-side fees fits in `budget`.
    pub fn max_affordable_quantity(&self, budget: Decimal, price: Decimal) -> u64 {
        if price <= Decimal::ZERO || budget <= Decimal::ZERO {
            return 0;
        }
        // Fees only grow with trade value, so the first fit walking down is the largest.
        let mut qty = (budget / price).floor().to_u64().unwrap_or(0);
        while qty > 0 {
            let trade_value = price * Decimal::from(qty);
            if trade_value + self.charges(trade_value, true) <= budget {
                return qty;
            }
            qty -= 1;
        }
        0
    }
}

/// Charges under the default schedule.
pub fn fees(trade_value: Decimal, is_buy: bool) -> Decimal {
    FeeSchedule::default().charges(trade_value, is_buy)
}

pub fn max_affordable_quantity(budget: Decimal, price: Decimal) -> u64 {
    FeeSchedule::default().max_affordable_quantity(budget, price)
}

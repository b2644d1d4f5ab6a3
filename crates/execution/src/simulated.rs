// In crates/execution/src/simulated.rs

use std::sync::Arc;

use crate::{Error, Fill, MarketGateway, Result, StopLossStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{Position, Ticker};
use database::{HistoricalStore, PriceSource};
use risk::FeeSchedule;
use rust_decimal::Decimal;

/// Answers gateway calls from recorded history instead of a broker.
///
/// Buys fill at the day's open. A stop counts as hit once any low since the
/// buy date reaches it, and the sale is valued at the stop price.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    store: Arc<HistoricalStore>,
    fees: FeeSchedule,
}

impl ReplaySource {
    pub fn new(store: Arc<HistoricalStore>, fees: FeeSchedule) -> Self {
        Self { store, fees }
    }
}

#[async_trait]
impl MarketGateway for ReplaySource {
    fn name(&self) -> &'static str {
        "ReplaySource"
    }

    async fn opening_price(&self, ticker: &Ticker, date: NaiveDate) -> Result<Option<Decimal>> {
        Ok(self.store.bar(ticker, date)?.map(|bar| bar.open))
    }

    async fn is_trading_day(&self, date: NaiveDate) -> Result<bool> {
        Ok(!self.store.trading_dates(date, date)?.is_empty())
    }

    async fn buy(&self, ticker: &Ticker, qty: u64, date: NaiveDate) -> Result<Fill> {
        let price = self
            .opening_price(ticker, date)
            .await?
            .ok_or_else(|| Error::NoPrice { ticker: ticker.clone(), date })?;
        let trade_value = price * Decimal::from(qty);
        let fees = self.fees.charges(trade_value, true);
        tracing::debug!(%ticker, %date, qty, %price, "Replay buy filled at open");
        Ok(Fill { ticker: ticker.clone(), qty, price, fees, total_cost: trade_value + fees })
    }

    async fn update_stop_loss(&self, ticker: &Ticker, qty: u64, stop_loss: Decimal) -> Result<()> {
        // Nothing rests anywhere; the stop is checked against recorded lows.
        tracing::debug!(%ticker, qty, %stop_loss, "Replay stop-loss noted");
        Ok(())
    }

    async fn stop_loss_status(&self, position: &Position, as_of: NaiveDate) -> Result<StopLossStatus> {
        let lowest = self
            .store
            .lowest_low_between(&position.ticker, position.buy_date, as_of)?;
        match lowest {
            Some(low) if low <= position.stop_loss => {
                let trade_value = position.stop_loss * Decimal::from(position.qty);
                let amount = trade_value - self.fees.charges(trade_value, false);
                Ok(StopLossStatus::triggered(position.stop_loss, amount))
            }
            _ => Ok(StopLossStatus::untriggered()),
        }
    }
}

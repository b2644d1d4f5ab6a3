// In crates/execution/src/live.rs

use crate::{Error, Fill, MarketGateway, Result, StopLossStatus};
use api_client::{ApiClient, OrderDetail, OrderStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{Position, Ticker};
use risk::FeeSchedule;
use rust_decimal::Decimal;

/// A gateway that quotes and trades through the broker's REST API.
///
/// Stops rest at the broker as stop-loss market orders; the order book (which
/// covers the current session) is the source of truth for whether one fired.
#[derive(Debug, Clone)]
pub struct LiveSource {
    /// The API client for communicating with the broker.
    api_client: ApiClient,
    fees: FeeSchedule,
}

impl LiveSource {
    pub fn new(api_client: ApiClient, fees: FeeSchedule) -> Self {
        Self { api_client, fees }
    }
}

/// The resting stop order for `symbol`, if any.
fn working_stop<'a>(orders: &'a [OrderDetail], symbol: &str) -> Option<&'a OrderDetail> {
    orders
        .iter()
        .find(|o| o.trading_symbol == symbol && o.is_stop_loss() && o.is_working())
}

/// A stop order for `symbol` that has already filled.
fn executed_stop<'a>(orders: &'a [OrderDetail], symbol: &str) -> Option<&'a OrderDetail> {
    orders
        .iter()
        .find(|o| o.trading_symbol == symbol && o.is_stop_loss() && o.status == OrderStatus::Executed)
}

#[async_trait]
impl MarketGateway for LiveSource {
    fn name(&self) -> &'static str {
        "LiveSource"
    }

    async fn opening_price(&self, ticker: &Ticker, date: NaiveDate) -> Result<Option<Decimal>> {
        // The broker only quotes the current session; `date` is the caller's view of it.
        let quote = self.api_client.get_quote(ticker.as_str()).await?;
        tracing::debug!(%ticker, %date, open = %quote.ohlc.open, "Fetched live quote");
        if quote.ohlc.open <= Decimal::ZERO {
            return Ok(None);
        }
        Ok(Some(quote.ohlc.open))
    }

    async fn is_trading_day(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.api_client.market_status(date).await?.is_trading_day)
    }

    async fn buy(&self, ticker: &Ticker, qty: u64, date: NaiveDate) -> Result<Fill> {
        tracing::info!(%ticker, qty, %date, "Placing live market buy...");
        let placed = self
            .api_client
            .place_market_buy(ticker.as_str(), qty)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, %ticker, "Failed to place market buy.");
                Error::ExecutionFailed { reason: format!("market buy for {ticker}: {e}") }
            })?;

        let detail = self.api_client.order_detail(&placed.order_id).await?;
        let price = match (detail.status, detail.average_fill_price) {
            (OrderStatus::Executed, Some(price)) if detail.filled_quantity > 0 => price,
            (status, _) => {
                return Err(Error::ExecutionFailed {
                    reason: format!("buy order {} for {ticker} not filled (status {status:?})", detail.order_id),
                });
            }
        };
        let filled = detail.filled_quantity;
        let trade_value = price * Decimal::from(filled);
        let fees = self.fees.charges(trade_value, true);
        tracing::info!(order_id = %detail.order_id, %ticker, filled, %price, "Live buy filled.");
        Ok(Fill { ticker: ticker.clone(), qty: filled, price, fees, total_cost: trade_value + fees })
    }

    async fn update_stop_loss(&self, ticker: &Ticker, qty: u64, stop_loss: Decimal) -> Result<()> {
        let orders = self.api_client.list_orders().await?;
        let response = match working_stop(&orders, ticker.as_str()) {
            Some(order) => {
                tracing::info!(order_id = %order.order_id, %ticker, %stop_loss, "Moving resting stop-loss.");
                self.api_client.modify_stop_loss(&order.order_id, qty, stop_loss).await
            }
            None => {
                tracing::info!(%ticker, qty, %stop_loss, "Placing new stop-loss order.");
                self.api_client.place_stop_loss(ticker.as_str(), qty, stop_loss).await
            }
        };
        let response = response.map_err(|e| {
            tracing::error!(error = ?e, %ticker, "Failed to set stop-loss.");
            Error::ExecutionFailed { reason: format!("stop-loss for {ticker}: {e}") }
        })?;
        if response.status == OrderStatus::Rejected {
            return Err(Error::ExecutionFailed {
                reason: format!("stop-loss order {} for {ticker} rejected", response.order_id),
            });
        }
        Ok(())
    }

    async fn stop_loss_status(&self, position: &Position, as_of: NaiveDate) -> Result<StopLossStatus> {
        let orders = self.api_client.list_orders().await?;
        let Some(order) = executed_stop(&orders, position.ticker.as_str()) else {
            return Ok(StopLossStatus::untriggered());
        };
        let price = order
            .average_fill_price
            .or(order.trigger_price)
            .unwrap_or(position.stop_loss);
        let qty = if order.filled_quantity > 0 { order.filled_quantity } else { position.qty };
        let trade_value = price * Decimal::from(qty);
        let amount = trade_value - self.fees.charges(trade_value, false);
        tracing::info!(order_id = %order.order_id, ticker = %position.ticker, %as_of, %price, "Stop-loss fill found.");
        Ok(StopLossStatus::triggered(price, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(id: &str, symbol: &str, order_type: &str, status: OrderStatus) -> OrderDetail {
        OrderDetail {
            order_id: id.to_string(),
            trading_symbol: symbol.to_string(),
            transaction_type: "SELL".to_string(),
            order_type: order_type.to_string(),
            status,
            quantity: 10,
            filled_quantity: 0,
            average_fill_price: None,
            trigger_price: Some(dec!(99)),
        }
    }

    #[test]
    fn finds_only_working_stops_for_the_symbol() {
        let orders = vec![
            order("1", "INFY", "SL_M", OrderStatus::Open),
            order("2", "RELIANCE", "MARKET", OrderStatus::Open),
            order("3", "RELIANCE", "SL_M", OrderStatus::Cancelled),
            order("4", "RELIANCE", "SL_M", OrderStatus::Pending),
        ];
        assert_eq!(working_stop(&orders, "RELIANCE").map(|o| o.order_id.as_str()), Some("4"));
        assert!(working_stop(&orders, "TCS").is_none());
    }

    #[test]
    fn executed_stop_ignores_market_orders() {
        let orders = vec![
            order("1", "INFY", "MARKET", OrderStatus::Executed),
            order("2", "INFY", "SL_M", OrderStatus::Open),
        ];
        assert!(executed_stop(&orders, "INFY").is_none());

        let orders = vec![order("3", "INFY", "SL_M", OrderStatus::Executed)];
        assert_eq!(executed_stop(&orders, "INFY").map(|o| o.order_id.as_str()), Some("3"));
    }
}

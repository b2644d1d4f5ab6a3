// In crates/execution/src/lib.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{Position, Ticker};
use rust_decimal::Decimal;

pub mod error;
pub mod live;
pub mod simulated;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use live::LiveSource;
pub use simulated::ReplaySource;
pub use types::{Fill, StopLossStatus};

/// Prices and order placement for the live plan/execute cycle.
///
/// The live broker and a historical replay both sit behind this interface, so
/// the planner runs unchanged against either.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// The name of the gateway (e.g., "LiveSource", "ReplaySource").
    fn name(&self) -> &'static str;

    /// `None` when the ticker has no price for `date`.
    async fn opening_price(&self, ticker: &Ticker, date: NaiveDate) -> Result<Option<Decimal>>;

    async fn is_trading_day(&self, date: NaiveDate) -> Result<bool>;

    /// Buys `qty` shares at market on `date`.
    async fn buy(&self, ticker: &Ticker, qty: u64, date: NaiveDate) -> Result<Fill>;

    /// Places or moves the protective stop for a holding of `qty` shares.
    async fn update_stop_loss(&self, ticker: &Ticker, qty: u64, stop_loss: Decimal) -> Result<()>;

    /// Checks whether the position's stop has been hit by `as_of`.
    async fn stop_loss_status(&self, position: &Position, as_of: NaiveDate) -> Result<StopLossStatus>;
}

// In crates/risk/src/lib.rs

use core_types::Position;
use rust_decimal::Decimal;

pub mod error;
pub mod fees;
pub mod simple_manager;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use fees::{FeeSchedule, fees, max_affordable_quantity};
pub use simple_manager::SimpleRiskManager;
pub use types::{BuyOrder, SimpleRiskSettings};

/// The universal interface for a risk management module.
///
/// A `RiskManager` turns a BUY decision into a sized order, or refuses it.
pub trait RiskManager: Send + Sync {
    /// The name of the risk management strategy.
    fn name(&self) -> &'static str;

    /// The fee schedule orders are costed with.
    fn fee_schedule(&self) -> &FeeSchedule;

    /// Sizes a BUY at `price` with the given protective `stop_loss`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(BuyOrder))`: the order to place.
    /// * `Ok(None)`: the budget does not cover a single share plus fees.
    /// * `Err(Error::Vetoed)`: a position is already open or the wallet is empty.
    fn size_buy(
        &self,
        price: Decimal,
        stop_loss: Decimal,
        wallet_cash: Decimal,
        open_position: Option<&Position>,
    ) -> Result<Option<BuyOrder>>;
}

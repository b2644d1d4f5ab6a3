// In crates/strategies/src/lib.rs

use core_types::Decision;
use database::{Ledger, PriceSource};

pub mod darvas;
pub mod error;
pub mod types;

pub use darvas::DarvasBreakout;
pub use error::{Error, Result};
pub use types::{DarvasSettings, DecisionRequest};

/// The universal interface for a trading strategy.
///
/// A strategy looks at price history up to (not including) the trading day and
/// emits a single `Decision` for one ticker. Its state lives in the ledger, so
/// the same instance can be shared across tickers and across process runs.
pub trait Strategy: Send + Sync {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    fn decide(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        request: &DecisionRequest,
    ) -> Result<Decision>;
}

// In crates/backtester/src/types.rs

use rust_decimal::Decimal;

/// Run-wide parameters that are not part of the strategy or risk model.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    /// Wallet cash the ledger started with; the base for return figures.
    pub starting_cash: Decimal,
    pub capital_gains_tax_rate: Decimal,
}

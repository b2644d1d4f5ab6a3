// In crates/database/src/ledger.rs

use chrono::NaiveDate;
use core_types::{DarvasBox, Position, Ticker, Transaction};
use events::{EventLevel, EventRecord};
use rust_decimal::Decimal;

use crate::Result;

/// Mutable trading state, keyed by ticker.
///
/// The decision engine owns boxes, streaks, box heights and the loss-carry
/// flag. The simulator and the live planner own positions, the wallet and the
/// transaction log.
pub trait Ledger {
    // --- Darvas boxes ---

    fn active_box(&self, ticker: &Ticker) -> Result<Option<DarvasBox>>;

    /// Stores `darvas_box` as the ticker's active box and returns it with its
    /// assigned id. Fails if the ticker already has an active box.
    fn open_box(&mut self, darvas_box: DarvasBox) -> Result<DarvasBox>;

    /// Deactivates the active box, stamping `end_date`.
    fn close_active_box(&mut self, ticker: &Ticker, end_date: NaiveDate) -> Result<()>;

    fn extend_active_box(&mut self, ticker: &Ticker, end_date: NaiveDate) -> Result<()>;

    /// Every box ever opened for the ticker, oldest first.
    fn boxes(&self, ticker: &Ticker) -> Result<Vec<DarvasBox>>;

    // --- Strategy state ---

    fn breakout_streak(&self, ticker: &Ticker) -> Result<u32>;

    fn set_breakout_streak(&mut self, ticker: &Ticker, streak: u32) -> Result<()>;

    /// `None` until the engine first sizes a box for the ticker.
    fn box_height(&self, ticker: &Ticker) -> Result<Option<Decimal>>;

    fn set_box_height(&mut self, ticker: &Ticker, height: Decimal) -> Result<()>;

    fn set_loss_pending(&mut self, ticker: &Ticker) -> Result<()>;

    /// Returns and clears the loss-carry flag.
    fn take_loss_pending(&mut self, ticker: &Ticker) -> Result<bool>;

    // --- Positions ---

    fn position(&self, ticker: &Ticker) -> Result<Option<Position>>;

    fn open_position(&mut self, position: Position) -> Result<()>;

    fn set_stop_loss(&mut self, ticker: &Ticker, stop_loss: Decimal) -> Result<()>;

    /// Removes and returns the position.
    fn close_position(&mut self, ticker: &Ticker) -> Result<Position>;

    fn positions(&self) -> Result<Vec<Position>>;

    // --- Wallet, transactions and events ---

    fn wallet_cash(&self) -> Result<Decimal>;

    fn set_wallet_cash(&mut self, cash: Decimal) -> Result<()>;

    fn record_transaction(&mut self, txn: Transaction) -> Result<()>;

    fn transactions(&self) -> Result<Vec<Transaction>>;

    fn log_event(&mut self, event: EventRecord) -> Result<()>;

    fn events(&self) -> Result<Vec<EventRecord>>;

    /// Emits `event` as a tracing record at its level, then appends it to the log.
    fn record_event(&mut self, event: EventRecord) -> Result<()> {
        match event.level {
            EventLevel::Info => tracing::info!(ticker = %event.ticker, date = %event.date, "{}", event.event),
            EventLevel::Warning => tracing::warn!(ticker = %event.ticker, date = %event.date, "{}", event.event),
            EventLevel::Error => tracing::error!(ticker = %event.ticker, date = %event.date, "{}", event.event),
        }
        self.log_event(event)
    }
}

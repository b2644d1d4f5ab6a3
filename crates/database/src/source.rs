// In crates/database/src/source.rs

use chrono::NaiveDate;
use core_types::{PriceBar, Ticker};
use rust_decimal::Decimal;

use crate::Result;

/// Read-only access to daily price history.
///
/// Every query that takes a `before` date only looks at bars strictly earlier
/// than it, so the decision engine never sees the day it is deciding on.
/// "Recent" queries return the most recent bar first.
pub trait PriceSource {
    fn bar(&self, ticker: &Ticker, date: NaiveDate) -> Result<Option<PriceBar>>;

    /// The first close on record for the ticker, with its date.
    fn earliest_close(&self, ticker: &Ticker) -> Result<Option<(NaiveDate, Decimal)>>;

    fn prev_trading_day(&self, ticker: &Ticker, before: NaiveDate) -> Result<Option<NaiveDate>>;

    fn prev_close(&self, ticker: &Ticker, before: NaiveDate) -> Result<Option<Decimal>>;

    fn recent_closes(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Vec<Decimal>>;

    /// Bars without a volume are skipped rather than counted against `lookback`.
    fn recent_volumes(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Vec<Decimal>>;

    /// Highest high over the last `lookback` bars before `before`.
    fn max_high(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Option<Decimal>>;

    /// Lowest low over `[from, to]`, both ends inclusive.
    fn lowest_low_between(&self, ticker: &Ticker, from: NaiveDate, to: NaiveDate) -> Result<Option<Decimal>>;

    fn last_bar(&self, ticker: &Ticker) -> Result<Option<PriceBar>>;

    fn tickers(&self) -> Result<Vec<Ticker>>;

    /// Distinct dates with at least one bar in `[start, end]`, ascending.
    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>>;
}

// In crates/backtester/src/error.rs

use chrono::NaiveDate;
use core_types::Ticker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Decision engine failed: {0}")]
    Strategy(#[from] strategies::Error),

    #[error("Ledger or price store failure: {0}")]
    Store(#[from] database::Error),

    #[error("Risk manager failed: {0}")]
    Risk(#[from] risk::Error),

    #[error("SELL for {ticker} on {date} with no shares held")]
    NoPositionToSell { ticker: Ticker, date: NaiveDate },

    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

pub type Result<T> = std::result::Result<T, Error>;

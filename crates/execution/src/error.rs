// In crates/execution/src/error.rs

use chrono::NaiveDate;
use core_types::Ticker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("API client error: {0}")]
    ApiClientError(#[from] api_client::Error),

    #[error("Price store error: {0}")]
    Store(#[from] database::Error),

    #[error("No opening price for {ticker} on {date}")]
    NoPrice { ticker: Ticker, date: NaiveDate },
}

pub type Result<T> = std::result::Result<T, Error>;

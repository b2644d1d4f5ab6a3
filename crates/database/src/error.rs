// In crates/database/src/error.rs

use core_types::Ticker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the database")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Database operation failed")]
    OperationFailed(sqlx::Error),
    #[error("Failed to (de)serialize a stored document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Stored row is malformed: {0}")]
    Corrupt(#[from] core_types::Error),

    #[error("Ticker {ticker} already has an active box (id {box_id})")]
    ActiveBoxExists { ticker: Ticker, box_id: u64 },
    #[error("Ticker {0} has no active box")]
    NoActiveBox(Ticker),
    #[error("Ticker {0} already has an open position")]
    PositionExists(Ticker),
    #[error("Ticker {0} has no open position")]
    NoPosition(Ticker),
}

pub type Result<T> = std::result::Result<T, Error>;

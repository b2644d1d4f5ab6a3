// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unrecognized transaction type: '{0}'")]
    UnknownTxnType(String),

    #[error("Unrecognized trading action: '{0}'")]
    UnknownAction(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Ledger errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid fill for {owner}: {reason}")]
    InvalidFill { owner: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

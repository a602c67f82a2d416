//! Error type for mixer control.

use thiserror::Error;

pub type MixerResult<T> = Result<T, MixerError>;

#[derive(Error, Debug)]
pub enum MixerError {
    #[error("failed to load mixer control library {path}: {reason}")]
    LibraryLoad { path: String, reason: String },

    #[error("mixer library is missing symbol {symbol}: {reason}")]
    MissingSymbol { symbol: &'static str, reason: String },

    #[error("{function} returned status {code}")]
    Call { function: &'static str, code: i32 },

    #[error("not logged in to the mixer")]
    NotLoggedIn,

    #[error("invalid parameter key: {0}")]
    InvalidKey(String),
}

/// Vendor status convention: negative = failure, anything else is a success code.
pub fn check_status(function: &'static str, code: i32) -> MixerResult<i32> {
    if code < 0 {
        Err(MixerError::Call { function, code })
    } else {
        Ok(code)
    }
}

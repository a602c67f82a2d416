//! Error types for the browser session

use std::time::Duration;
use thiserror::Error;

/// Result type alias for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Timed out after {timeout:?} waiting for {selector}")]
    ElementTimeout { selector: String, timeout: Duration },

    #[error("Auth state error: {0}")]
    AuthState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

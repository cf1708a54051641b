use std::time::Duration;

use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser session failed to start: {0}")]
    SessionInit(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("navigation to {url} failed after {elapsed:?}: {reason}")]
    Navigation {
        url: String,
        elapsed: Duration,
        reason: String,
    },
    #[error("no rating filter control for {rating} star(s) (saw: {available:?})")]
    FilterNotFound { rating: u8, available: Vec<String> },
    #[error("timeout after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("profile error: {0}")]
    Profile(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl BrowserError {
    /// Session and address level failures end the run; everything else is
    /// scoped to the rating being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::SessionInit(_)
                | BrowserError::Navigation { .. }
                | BrowserError::Configuration(_)
                | BrowserError::Profile(_)
        )
    }
}

impl From<tokio::task::JoinError> for BrowserError {
    fn from(err: tokio::task::JoinError) -> Self {
        BrowserError::Unexpected(err.to_string())
    }
}

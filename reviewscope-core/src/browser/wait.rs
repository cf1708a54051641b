use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::error::BrowserError;

/// Single timeout policy shared by every render/navigation wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn start(&self, what: impl Into<String>) -> BoundedWait {
        BoundedWait {
            what: what.into(),
            policy: *self,
            started: Instant::now(),
        }
    }
}

/// A running wait. Callers check their condition, then `tick`; `tick`
/// sleeps one poll interval or reports that the deadline has passed.
///
/// ```ignore
/// let mut wait = policy.start("product page");
/// loop {
///     if session.is_present(marker).await? {
///         break;
///     }
///     wait.tick().await?;
/// }
/// ```
#[derive(Debug)]
pub struct BoundedWait {
    what: String,
    policy: WaitPolicy,
    started: Instant,
}

impl BoundedWait {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.policy.timeout
    }

    pub async fn tick(&mut self) -> Result<(), BrowserError> {
        if self.expired() {
            return Err(self.timeout_error());
        }
        let remaining = self.policy.timeout.saturating_sub(self.elapsed());
        sleep(self.policy.poll_interval.min(remaining)).await;
        Ok(())
    }

    pub fn timeout_error(&self) -> BrowserError {
        BrowserError::Timeout {
            what: self.what.clone(),
            elapsed: self.elapsed(),
        }
    }
}

//! Bounded retry for cache fetches.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::traits::FetchError;

/// How often a failed fetch is repeated before the error is recorded.
///
/// Retrying is off unless configured, and the count is always bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  max_retries: u32,
  delay: Duration,
}

impl RetryPolicy {
  /// Upper bound on configurable retries.
  pub const MAX_RETRIES: u32 = 10;

  pub const fn none() -> Self {
    Self {
      max_retries: 0,
      delay: Duration::ZERO,
    }
  }

  /// Retry up to `max_retries` times (clamped to [`Self::MAX_RETRIES`]),
  /// sleeping `delay` between attempts.
  pub fn new(max_retries: u32, delay: Duration) -> Self {
    Self {
      max_retries: max_retries.min(Self::MAX_RETRIES),
      delay,
    }
  }

  pub fn max_retries(&self) -> u32 {
    self.max_retries
  }

  pub(crate) async fn run<T, E, F, Fut>(&self, key: &str, fetcher: &F) -> Result<T, E>
  where
    E: FetchError,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let mut attempt = 0;
    loop {
      match fetcher().await {
        Err(e) if e.is_retryable() && attempt < self.max_retries => {
          attempt += 1;
          warn!(key, attempt, max = self.max_retries, error = %e, "fetch failed, retrying");
          tokio::time::sleep(self.delay).await;
        }
        result => return result,
      }
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::none()
  }
}

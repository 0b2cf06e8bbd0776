use std::time::Duration;

use crate::errors::StoreError;

/// Bounded-attempt, fixed-backoff retry for store operations.
///
/// The loop is iterative so the attempt limit is a plain, testable
/// parameter. Only transient errors (see [`StoreError::is_transient`]) are
/// re-attempted; anything else propagates on the first failure. When the
/// limit is reached the last error is surfaced inside
/// [`StoreError::RetryExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, backoff: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts, backoff }
    }

    /// Runs `op` under this policy, suspending between attempts.
    pub async fn run<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: AsyncFnMut() -> Result<T, StoreError>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max => {
                    return Err(StoreError::RetryExhausted { attempts: attempt, source: Box::new(e) });
                }
                Err(e) => {
                    log::warn!(
                        "transient store error (attempt {attempt}/{max}): {e}; retrying in {:?}",
                        self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// Same policy for blocking callers, sleeping the thread between
    /// attempts instead of suspending.
    pub fn run_blocking<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max => {
                    return Err(StoreError::RetryExhausted { attempts: attempt, source: Box::new(e) });
                }
                Err(e) => {
                    log::warn!(
                        "transient store error (attempt {attempt}/{max}): {e}; retrying in {:?}",
                        self.backoff
                    );
                    std::thread::sleep(self.backoff);
                }
            }
        }
    }
}

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};

use crate::ports::catalog::CatalogError;

/// Exponential wait policy: the n-th consecutive failure waits `unit * 2^n`.
///
/// There is no attempt limit. Callers keep retrying the exact same unit of
/// work until it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    unit: Duration,
}

impl BackoffPolicy {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    /// Policy that never sleeps. Used by tests.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn wait(&self, fail_count: u32) -> Duration {
        let factor = 1u32.checked_shl(fail_count).unwrap_or(u32::MAX);
        self.unit.saturating_mul(factor)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Endless delay sequence produced by [`BackoffPolicy`]. Each sequence starts
/// its own fail counter at zero.
#[derive(Debug)]
pub struct PolicyBackoff {
    policy: BackoffPolicy,
    fail_count: u32,
}

impl Iterator for PolicyBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let wait = self.policy.wait(self.fail_count);
        self.fail_count = self.fail_count.saturating_add(1);
        Some(wait)
    }
}

impl BackoffBuilder for BackoffPolicy {
    type Backoff = PolicyBackoff;

    fn build(self) -> Self::Backoff {
        PolicyBackoff {
            policy: self,
            fail_count: 0,
        }
    }
}

/// Run `operation` until it succeeds, sleeping per `policy` between attempts.
///
/// `operation` is re-invoked as-is, so it must rebuild the same request
/// (same offsets, same batch slice) every time.
pub async fn retry<T, F, Fut>(
    policy: BackoffPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    operation
        .retry(policy)
        .notify(|err: &CatalogError, wait: Duration| {
            tracing::warn!(
                operation = operation_name,
                rate_limited = err.is_rate_limit(),
                wait = %humantime::format_duration(wait),
                "Remote call failed: {err}. Backing off"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_wait_doubles_per_failure() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.wait(0), Duration::from_secs(1));
        assert_eq!(policy.wait(1), Duration::from_secs(2));
        assert_eq!(policy.wait(5), Duration::from_secs(32));
    }

    #[test]
    fn test_wait_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.wait(40), Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_each_sequence_starts_from_zero() {
        let policy = BackoffPolicy::new(Duration::from_millis(10));
        let first: Vec<_> = policy.build().take(3).collect();
        let second: Vec<_> = policy.build().take(1).collect();
        assert_eq!(
            first,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40)
            ]
        );
        assert_eq!(second, vec![Duration::from_millis(10)]);
    }

    #[tokio::test]
    async fn test_retry_repeats_until_success() {
        let attempts = AtomicU32::new(0);
        let value = retry(BackoffPolicy::immediate(), "flaky", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(CatalogError::transient("not yet"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(tokio_test::assert_ok!(value), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}

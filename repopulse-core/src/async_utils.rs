//! Async utilities and patterns
//!
//! Retry with backoff, timeouts and a shared upstream request budget

use crate::error::{ErrorContext, PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds, also caps upstream hints
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add +/-10% jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Config for tests and callers that must not wait
    pub fn no_delay(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn jittered(&self, delay_ms: u64) -> u64 {
        if self.jitter {
            let jitter_factor = 0.1;
            let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
            ((delay_ms as f64) * (1.0 + jitter)) as u64
        } else {
            delay_ms
        }
    }

    fn next_delay(&self, delay_ms: u64) -> u64 {
        (((delay_ms as f64) * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

#[derive(Debug, Default)]
struct BudgetState {
    resume_at: Option<Instant>,
    rate_limit_hits: u64,
}

/// Request budget shared by every request made with one upstream credential.
///
/// Bounds in-flight requests and, once the upstream signals a rate limit,
/// holds all callers until the advertised resume time.
#[derive(Debug)]
pub struct RateLimitBudget {
    permits: Arc<Semaphore>,
    state: Mutex<BudgetState>,
}

impl RateLimitBudget {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            state: Mutex::new(BudgetState::default()),
        }
    }

    /// Wait out any active pause, then take a request slot
    pub async fn acquire(&self) -> PulseResult<RateLimitGuard> {
        loop {
            let wait = {
                let state = self.state.lock().await;
                state
                    .resume_at
                    .and_then(|resume_at| resume_at.checked_duration_since(Instant::now()))
            };
            match wait {
                Some(wait) if !wait.is_zero() => {
                    debug!(
                        sleep_ms = wait.as_millis() as u64,
                        "Rate limit budget paused, waiting"
                    );
                    sleep(wait).await;
                }
                _ => break,
            }
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PulseError::Internal {
                message: format!("Failed to acquire request permit: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("rate_limit_budget").with_operation("acquire"),
            })?;

        Ok(RateLimitGuard { _permit: permit })
    }

    /// Pause every caller for at least `delay`
    pub async fn record_rate_limit(&self, delay: Duration) {
        let mut state = self.state.lock().await;
        state.rate_limit_hits += 1;
        let candidate = Instant::now() + delay;
        state.resume_at = Some(match state.resume_at {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        });
    }

    pub async fn rate_limit_hits(&self) -> u64 {
        self.state.lock().await.rate_limit_hits
    }

    /// Remaining pause, if the budget is currently paused
    pub async fn paused_for(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        state
            .resume_at
            .and_then(|resume_at| resume_at.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }
}

/// RAII guard for an in-flight request slot
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

/// Retry a recoverable operation with exponential backoff.
///
/// Non-recoverable errors return immediately. A rate-limit hint replaces the
/// computed delay (capped at `max_delay_ms`) and pauses the shared budget.
/// When attempts run out the last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    budget: Option<&RateLimitBudget>,
    operation_name: &str,
    mut operation: F,
) -> PulseResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PulseResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        let result = match budget {
            Some(budget) => {
                let _guard = budget.acquire().await?;
                operation().await
            }
            None => operation().await,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) if !error.is_recoverable() => return Err(error),
            Err(error) => error,
        };

        if attempt >= max_attempts {
            error!(
                operation = operation_name,
                attempt = attempt,
                error = %error,
                "Operation failed after all retry attempts"
            );
            return Err(error);
        }

        let wait_ms = match error.retry_delay_ms() {
            Some(hint) => hint.min(config.max_delay_ms),
            None => config.jittered(delay),
        };

        warn!(
            operation = operation_name,
            attempt = attempt,
            error = %error,
            delay_ms = wait_ms,
            "Operation failed, retrying"
        );

        match (budget, &error) {
            (Some(budget), PulseError::RateLimited { .. }) => {
                budget.record_rate_limit(Duration::from_millis(wait_ms)).await;
            }
            _ => sleep(Duration::from_millis(wait_ms)).await,
        }

        delay = config.next_delay(delay);
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> PulseResult<T>
where
    F: Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(PulseError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase the timeout duration"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::not_found_error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> PulseError {
        PulseError::TransientNetwork {
            message: "connection reset".to_string(),
            source: None,
            context: ErrorContext::new("test"),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff(&RetryConfig::no_delay(5), None, "flaky", || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(transient())
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: PulseResult<()> =
            retry_with_backoff(&RetryConfig::no_delay(5), None, "missing", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(not_found_error!("repos/a/b", "test")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let calls = AtomicUsize::new(0);
        let budget = RateLimitBudget::new(2);
        let result: PulseResult<()> =
            retry_with_backoff(&RetryConfig::no_delay(3), Some(&budget), "limited", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(PulseError::RateLimited {
                        message: "secondary rate limit".to_string(),
                        retry_after_ms: Some(60_000),
                        context: ErrorContext::new("test"),
                    })
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // hint capped at max_delay_ms (0 here), so no real pause remains
        assert_eq!(budget.rate_limit_hits().await, 2);
        assert!(budget.paused_for().await.is_none());
    }

    #[tokio::test]
    async fn test_budget_pause_delays_acquire() {
        let budget = RateLimitBudget::new(1);
        budget.record_rate_limit(Duration::from_millis(50)).await;
        assert!(budget.paused_for().await.is_some());

        let start = std::time::Instant::now();
        let _guard = budget.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_with_timeout() {
        let quick = with_timeout(async { 7 }, 100, "quick").await;
        assert_eq!(quick.unwrap(), 7);

        let slow = with_timeout(sleep(Duration::from_millis(200)), 20, "slow").await;
        assert_eq!(slow.unwrap_err().kind(), ErrorKind::Timeout);
    }
}

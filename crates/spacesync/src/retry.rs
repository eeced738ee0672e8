//! Retry utilities and per-item retry accounting.
//!
//! Transports wrap their calls in [`with_retry`] so throttled requests are
//! retried with exponential backoff. Every retry is also recorded into the
//! [`RetryCounter`] attached to the current task by [`scope`], which is how the
//! sync engine reports transport retries per item without the client knowing
//! anything about items.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::space::{SpaceError, short_error_message};
use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_THROTTLE_RETRIES, ProgressCallback, SyncProgress, emit,
};

/// Backoff policy for throttled space requests.
///
/// The delay starts at `initial_backoff`, doubles per retry and is capped at
/// `max_backoff`. Only throttling is retried; see [`SpaceError::is_throttled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_THROTTLE_RETRIES,
            jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(initial_backoff: Duration, max_backoff: Duration, max_retries: u32) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            max_retries,
            jitter: true,
        }
    }

    /// Fixed delays, for deterministic tests and replays.
    #[must_use]
    pub fn without_jitter(self) -> Self {
        Self {
            jitter: false,
            ..self
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_retries as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Shared count of transport retries for one unit of work.
#[derive(Debug, Clone, Default)]
pub struct RetryCounter(Arc<AtomicU32>);

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

tokio::task_local! {
    static RETRY_COUNTER: RetryCounter;
}

/// Run `fut` with `counter` attached to the task context.
///
/// Task locals do not cross `tokio::spawn`; work spawned inside the scope
/// records nothing unless it opens its own scope.
pub async fn scope<F: Future>(counter: RetryCounter, fut: F) -> F::Output {
    RETRY_COUNTER.scope(counter, fut).await
}

/// Record one retry into the counter in scope, if any.
pub fn record_retry() {
    let _ = RETRY_COUNTER.try_with(RetryCounter::increment);
}

/// Number of retries recorded in the current scope, if a counter is attached.
#[must_use]
pub fn current_retries() -> Option<u32> {
    RETRY_COUNTER.try_with(RetryCounter::get).ok()
}

/// Run a space request, retrying it while the space throttles.
///
/// Each retry is recorded into the task's [`RetryCounter`] and reported as
/// [`SyncProgress::RateLimitBackoff`]. Any other error is returned at once.
///
/// # Example
///
/// ```ignore
/// use spacesync::retry::{RetryConfig, with_retry};
///
/// let story = with_retry(
///     || async { http.get_story(space, id).await },
///     RetryConfig::default(),
///     "get_story",
///     Some(&progress_callback),
/// )
/// .await?;
/// ```
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    config: RetryConfig,
    label: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, SpaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SpaceError>>,
{
    let attempts = AtomicU32::new(0);
    let request = || {
        attempts.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    request
        .retry(config.backoff())
        .notify(|err: &SpaceError, delay: Duration| {
            let attempt = attempts.load(Ordering::SeqCst);
            record_retry();
            emit(
                on_progress,
                SyncProgress::RateLimitBackoff {
                    label: label.to_string(),
                    retry_after_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                },
            );
            tracing::debug!(
                label,
                attempt,
                ?delay,
                "Throttled, backing off: {}",
                short_error_message(err)
            );
        })
        .when(SpaceError::is_throttled)
        .await
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::SpaceId;

/// Default request rates per space.
pub mod rate_limits {
    /// Requests per second for a regular space.
    pub const DEFAULT_RPS: f64 = 7.0;
    /// Burst size for a regular space.
    pub const DEFAULT_BURST: u32 = 7;
    /// Requests per second for a space on a constrained plan.
    pub const CONSTRAINED_RPS: f64 = 3.0;
    /// Burst size for a space on a constrained plan.
    pub const CONSTRAINED_BURST: u32 = 3;
}

/// The wait was abandoned because the cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Direction of a request, each with its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// Rate and burst of a token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSettings {
    /// Tokens added per second.
    pub rate: f64,
    /// Maximum number of tokens held.
    pub burst: u32,
}

impl RateSettings {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate: if rate > 0.0 { rate } else { 1.0 },
            burst: burst.max(1),
        }
    }

    /// Settings for a constrained plan.
    pub fn constrained() -> Self {
        Self::new(rate_limits::CONSTRAINED_RPS, rate_limits::CONSTRAINED_BURST)
    }
}

impl Default for RateSettings {
    fn default() -> Self {
        Self::new(rate_limits::DEFAULT_RPS, rate_limits::DEFAULT_BURST)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    burst: f64,
    rate: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(settings: RateSettings) -> Self {
        Self {
            tokens: f64::from(settings.burst),
            burst: f64::from(settings.burst),
            rate: settings.rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
        }
    }
}

#[derive(Debug)]
struct SpaceBuckets {
    read: Mutex<Bucket>,
    write: Mutex<Bucket>,
}

impl SpaceBuckets {
    fn new(settings: RateSettings) -> Self {
        Self {
            read: Mutex::new(Bucket::new(settings)),
            write: Mutex::new(Bucket::new(settings)),
        }
    }

    fn bucket(&self, direction: Direction) -> MutexGuard<'_, Bucket> {
        let lock = match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        };
        lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-space, per-direction token bucket limiter with adaptive rates.
///
/// Buckets are created lazily on first use and refilled lazily from elapsed
/// time on every access; there is no background timer. The effective rate is
/// nudged up after unthrottled successes and down after throttling, tracking a
/// provider ceiling that is unknown and may change over time.
///
/// # Example
///
/// ```ignore
/// use spacesync::space::SpaceRateLimiter;
///
/// let limiter = SpaceRateLimiter::new();
///
/// limiter.wait_write(&cancel, target_space).await?;
/// match client.create_story(target_space, &node, false).await {
///     Ok(_) => limiter.nudge_write(target_space, 0.5, 1.0, 14.0),
///     Err(e) if e.is_throttled() => limiter.nudge_write(target_space, -1.0, 1.0, 14.0),
///     Err(_) => {}
/// }
/// ```
#[derive(Debug, Default)]
pub struct SpaceRateLimiter {
    defaults: RateSettings,
    overrides: HashMap<SpaceId, RateSettings>,
    spaces: Mutex<HashMap<SpaceId, Arc<SpaceBuckets>>>,
}

impl SpaceRateLimiter {
    /// Create a limiter using the default rate for every space.
    pub fn new() -> Self {
        Self::with_defaults(RateSettings::default())
    }

    /// Create a limiter with custom default settings.
    pub fn with_defaults(defaults: RateSettings) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            spaces: Mutex::new(HashMap::new()),
        }
    }

    /// Use specific settings for one space (e.g. a constrained plan).
    ///
    /// Only affects buckets created after this call.
    #[must_use]
    pub fn with_space_limit(mut self, space: SpaceId, settings: RateSettings) -> Self {
        self.overrides.insert(space, settings);
        self
    }

    fn buckets(&self, space: SpaceId) -> Arc<SpaceBuckets> {
        let mut spaces = self.spaces.lock().unwrap_or_else(|e| e.into_inner());
        let settings = self.overrides.get(&space).copied().unwrap_or(self.defaults);
        Arc::clone(
            spaces
                .entry(space)
                .or_insert_with(|| Arc::new(SpaceBuckets::new(settings))),
        )
    }

    /// Wait for a read token of `space`.
    pub async fn wait_read(
        &self,
        cancel: &CancellationToken,
        space: SpaceId,
    ) -> Result<(), Cancelled> {
        self.wait(cancel, space, Direction::Read).await
    }

    /// Wait for a write token of `space`.
    pub async fn wait_write(
        &self,
        cancel: &CancellationToken,
        space: SpaceId,
    ) -> Result<(), Cancelled> {
        self.wait(cancel, space, Direction::Write).await
    }

    /// Wait until a token is available, then consume exactly one.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        space: SpaceId,
        direction: Direction,
    ) -> Result<(), Cancelled> {
        let buckets = self.buckets(space);
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let delay = buckets.bucket(direction).try_acquire(Instant::now());
            let Some(delay) = delay else {
                return Ok(());
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Adjust the read rate of `space` by `delta`, clamped to `[min, max]`.
    pub fn nudge_read(&self, space: SpaceId, delta: f64, min: f64, max: f64) -> f64 {
        self.nudge(space, Direction::Read, delta, min, max)
    }

    /// Adjust the write rate of `space` by `delta`, clamped to `[min, max]`.
    pub fn nudge_write(&self, space: SpaceId, delta: f64, min: f64, max: f64) -> f64 {
        self.nudge(space, Direction::Write, delta, min, max)
    }

    /// Adjust a rate and return the new value.
    ///
    /// A non-finite `delta` or bound leaves the rate unchanged.
    pub fn nudge(
        &self,
        space: SpaceId,
        direction: Direction,
        delta: f64,
        min: f64,
        max: f64,
    ) -> f64 {
        let buckets = self.buckets(space);
        let mut bucket = buckets.bucket(direction);
        if !(delta.is_finite() && min.is_finite() && max.is_finite()) {
            tracing::warn!(space, delta, min, max, "Ignoring non-finite rate adjustment");
            return bucket.rate;
        }

        // Settle tokens earned at the old rate before switching.
        bucket.refill(Instant::now());
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        bucket.rate =
            (bucket.rate + delta).clamp(lo.max(f64::MIN_POSITIVE), hi.max(f64::MIN_POSITIVE));
        bucket.rate
    }

    /// Current rate of a bucket in requests per second.
    pub fn rate(&self, space: SpaceId, direction: Direction) -> f64 {
        self.buckets(space).bucket(direction).rate
    }
}

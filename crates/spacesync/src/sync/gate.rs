use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::Result;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::NudgeSettings;
use crate::space::{Direction, SpaceId, SpaceRateLimiter};

/// Rate-limited entry point for every remote call made during a run.
///
/// Each call waits for a token of the matching bucket first, then feeds the
/// outcome back into the limiter: a success raises the rate, a throttling
/// error lowers it.
#[derive(Clone)]
pub(crate) struct RequestGate {
    limiter: Arc<SpaceRateLimiter>,
    cancel: CancellationToken,
    nudge: NudgeSettings,
    progress: Option<Arc<ProgressCallback>>,
}

impl RequestGate {
    pub(crate) fn new(
        limiter: Arc<SpaceRateLimiter>,
        cancel: CancellationToken,
        nudge: NudgeSettings,
        progress: Option<Arc<ProgressCallback>>,
    ) -> Self {
        Self {
            limiter,
            cancel,
            nudge,
            progress,
        }
    }

    pub(crate) async fn read<T, F, Fut>(&self, space: SpaceId, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::space::Result<T>>,
    {
        self.call(space, Direction::Read, call).await
    }

    pub(crate) async fn write<T, F, Fut>(&self, space: SpaceId, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::space::Result<T>>,
    {
        self.call(space, Direction::Write, call).await
    }

    async fn call<T, F, Fut>(&self, space: SpaceId, direction: Direction, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::space::Result<T>>,
    {
        self.limiter.wait(&self.cancel, space, direction).await?;

        let result = call().await;
        let NudgeSettings {
            increase,
            decrease,
            min_rate,
            max_rate,
        } = self.nudge;

        match &result {
            Ok(_) => {
                self.limiter
                    .nudge(space, direction, increase, min_rate, max_rate);
            }
            Err(e) if e.is_throttled() => {
                let rate = self
                    .limiter
                    .nudge(space, direction, -decrease, min_rate, max_rate);
                emit(
                    self.progress.as_deref(),
                    SyncProgress::Throttled { space, rate },
                );
            }
            Err(_) => {}
        }

        Ok(result?)
    }
}

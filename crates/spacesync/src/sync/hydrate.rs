use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use super::context::SyncContext;
use super::error::Result;
use super::gate::RequestGate;
use super::progress::SyncProgress;
use super::types::{HydrationStats, PreflightItem};
use crate::cache::HydrationCache;
use crate::space::{
    ApiKey, ContentVersion, SpaceClient, SpaceId, StoryId, TokenAccess, short_error_message,
};

/// One record to prefetch.
#[derive(Debug, Clone)]
struct HydrationTask {
    id: StoryId,
    full_slug: String,
    published: bool,
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    drafts: AtomicUsize,
    published: AtomicUsize,
    misses: AtomicUsize,
}

struct Worker<C> {
    source: Arc<C>,
    space: SpaceId,
    key: ApiKey,
    gate: RequestGate,
    cache: Arc<HydrationCache>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
}

impl<C: SpaceClient + 'static> Worker<C> {
    async fn run(self, tasks: async_channel::Receiver<HydrationTask>) {
        loop {
            let task = tokio::select! {
                _ = self.cancel.cancelled() => break,
                task = tasks.recv() => match task {
                    Ok(task) => task,
                    Err(_) => break,
                },
            };
            self.hydrate(task).await;
        }
    }

    async fn hydrate(&self, task: HydrationTask) {
        let (want_draft, want_published) = match self.key.access {
            TokenAccess::Preview => (true, task.published),
            TokenAccess::Public => (false, task.published),
        };

        let mut cached = false;

        if want_draft {
            match self.fetch(&task, ContentVersion::Draft).await {
                Ok(Some(content)) => {
                    self.cache.put_draft(task.id, content);
                    self.counters.drafts.fetch_add(1, Ordering::Relaxed);
                    cached = true;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(full_slug = %task.full_slug, "Draft prefetch failed: {}", e)
                }
            }
        }

        if want_published {
            match self.fetch(&task, ContentVersion::Published).await {
                Ok(Some(content)) => {
                    self.cache.put_published(task.id, content);
                    self.counters.published.fetch_add(1, Ordering::Relaxed);
                    cached = true;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(full_slug = %task.full_slug, "Published prefetch failed: {}", e)
                }
            }
        }

        if !cached {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    async fn fetch(
        &self,
        task: &HydrationTask,
        version: ContentVersion,
    ) -> Result<Option<serde_json::Value>> {
        let source = &self.source;
        let space = self.space;
        let key = &self.key;
        let nodes = self
            .gate
            .read(space, || {
                source.walk_stories(space, key, &task.full_slug, version)
            })
            .await?;

        Ok(nodes
            .into_iter()
            .find(|n| n.full_slug == task.full_slug)
            .and_then(|n| n.content))
    }
}

impl<C: SpaceClient + 'static> SyncContext<C> {
    /// Prefetch content for the non-folder items of a plan.
    ///
    /// Uses the most capable delivery credential of the source space: a preview
    /// key reads drafts (plus the published variant of published items), a
    /// public key reads only published items. Individual failures are logged
    /// and counted as misses; they never abort the pass.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn hydrate(&self, items: &[PreflightItem]) -> HydrationStats {
        let stories: Vec<_> = items.iter().filter(|item| !item.node.is_folder).collect();
        let tasks: Vec<HydrationTask> = stories
            .iter()
            .filter_map(|item| {
                Some(HydrationTask {
                    id: item.node.id?,
                    full_slug: item.node.full_slug.clone(),
                    published: item.node.published,
                })
            })
            .collect();

        let total = stories.len();
        let without_id = total - tasks.len();
        let workers = self.options.hydration_workers.max(1).min(total.max(1));
        self.emit(SyncProgress::HydrationStarted { total, workers });

        let stats = match self.hydration_key().await {
            Some(key) => {
                let mut stats = self.run_hydration(key, tasks, workers).await;
                stats.total = total;
                stats.misses += without_id;
                stats
            }
            None => HydrationStats {
                total,
                misses: total,
                ..HydrationStats::default()
            },
        };

        self.emit(SyncProgress::HydrationComplete {
            total: stats.total,
            drafts: stats.drafts,
            published: stats.published,
            misses: stats.misses,
        });
        stats
    }

    async fn hydration_key(&self) -> Option<ApiKey> {
        let source = &self.source;
        let space = self.source_space;
        let keys = match self.gate.read(space, || source.list_api_keys(space)).await {
            Ok(keys) => keys,
            Err(e) => {
                let message = format!(
                    "Skipping hydration, cannot list API keys: {}",
                    short_error_message(&e)
                );
                tracing::warn!("{}", message);
                self.emit(SyncProgress::Warning { message });
                return None;
            }
        };

        match ApiKey::best(&keys) {
            Some(key) => Some(key.clone()),
            None => {
                let message = "Skipping hydration, source space has no delivery key".to_string();
                tracing::warn!("{}", message);
                self.emit(SyncProgress::Warning { message });
                None
            }
        }
    }

    async fn run_hydration(
        &self,
        key: ApiKey,
        tasks: Vec<HydrationTask>,
        workers: usize,
    ) -> HydrationStats {
        let total = tasks.len();
        let counters = Arc::new(Counters::default());
        let (tx, rx) = async_channel::bounded(total.max(1));

        let mut queued = 0;
        for task in tasks {
            // The channel is sized to hold every task.
            if tx.try_send(task).is_ok() {
                queued += 1;
            }
        }
        tx.close();

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let worker = Worker {
                source: Arc::clone(&self.source),
                space: self.source_space,
                key: key.clone(),
                gate: self.gate.clone(),
                cache: Arc::clone(&self.hydration),
                counters: Arc::clone(&counters),
                cancel: self.cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run(rx.clone())));
        }
        drop(rx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Hydration worker failed: {}", e);
            }
        }

        let processed = counters.processed.load(Ordering::Relaxed);
        // Tasks left in the queue after cancellation were never fetched.
        let abandoned = queued - processed.min(queued);

        HydrationStats {
            total,
            drafts: counters.drafts.load(Ordering::Relaxed),
            published: counters.published.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed) + abandoned,
        }
    }
}

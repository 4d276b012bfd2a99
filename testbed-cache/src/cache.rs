use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use testbed_store::Store;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::materializer::{Materializer, Views};

struct CacheEntry<V> {
    last_access: Instant,
    views: Arc<Views<V>>,
}

struct Inner<M: Materializer> {
    materializer: M,
    store: Store,
    config: CacheConfig,
    summaries: DashMap<Uuid, M::Summary>,
    entries: Mutex<HashMap<Uuid, CacheEntry<M::View>>>,
    shutdown: CancellationToken,
    gc_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Cache of derived result views with idle-time eviction.
///
/// Summaries registered through [`add`](Self::add) are kept for the life of
/// the cache. Views are dropped once idle for the configured TTL and rebuilt
/// from the store on the next access.
pub struct ResultCache<M: Materializer> {
    inner: Arc<Inner<M>>,
}

impl<M: Materializer> Clone for ResultCache<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Materializer> ResultCache<M> {
    pub fn new(materializer: M, store: Store, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                materializer,
                store,
                config,
                summaries: DashMap::new(),
                entries: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                gc_task: parking_lot::Mutex::new(None),
            }),
        }
    }

    #[inline]
    pub fn materializer(&self) -> &M {
        &self.inner.materializer
    }

    /// Register a result: record its summary and warm its views.
    ///
    /// The summary is registered even when the views can't be built; the
    /// error is still returned to the caller.
    pub async fn add(&self, raw: &M::Raw) -> Result<M::Summary, CacheError> {
        let uuid = self.inner.materializer.uuid(raw);
        let built = {
            let mut entries = self.inner.entries.lock().await;
            match entries.get(&uuid) {
                Some(entry) => Ok(Arc::clone(&entry.views)),
                None => self.inner.materializer.materialize(raw).map(|views| {
                    let views = Arc::new(views);
                    entries.insert(
                        uuid,
                        CacheEntry {
                            last_access: Instant::now(),
                            views: Arc::clone(&views),
                        },
                    );
                    views
                }),
            }
        };

        match built {
            Ok(views) => {
                let summary = self.inner.materializer.summarize(raw, &views);
                self.inner.summaries.insert(uuid, summary.clone());
                tracing::debug!(%uuid, targets = views.len(), "result registered");
                Ok(summary)
            }
            Err(e) => {
                let summary = self.inner.materializer.summarize(raw, &Views::new());
                self.inner.summaries.insert(uuid, summary);
                tracing::warn!(%uuid, error = %e, "result registered without views");
                Err(e)
            }
        }
    }

    /// Derived views for `uuid`, rebuilt from the store on a miss.
    pub async fn derived_views(&self, uuid: Uuid) -> Result<Arc<Views<M::View>>, CacheError> {
        let mut entries = self.inner.entries.lock().await;
        if let Some(entry) = entries.get_mut(&uuid) {
            entry.last_access = Instant::now();
            return Ok(Arc::clone(&entry.views));
        }

        let ns = self.inner.materializer.namespace();
        let raw: M::Raw = self
            .inner
            .store
            .get_record(Some(ns), &uuid.to_string())
            .await?
            .ok_or(CacheError::NotFound(uuid))?;

        tracing::debug!(%uuid, "materializing views from store");
        let views = Arc::new(self.inner.materializer.materialize(&raw)?);
        entries.insert(
            uuid,
            CacheEntry {
                last_access: Instant::now(),
                views: Arc::clone(&views),
            },
        );
        Ok(views)
    }

    pub fn summary(&self, uuid: Uuid) -> Option<M::Summary> {
        self.inner.summaries.get(&uuid).map(|s| s.value().clone())
    }

    pub fn summaries(&self) -> Vec<M::Summary> {
        self.inner
            .summaries
            .iter()
            .map(|s| s.value().clone())
            .collect()
    }

    pub async fn is_cached(&self, uuid: Uuid) -> bool {
        self.inner.entries.lock().await.contains_key(&uuid)
    }

    pub async fn cached_len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    /// Evict every entry idle for at least the TTL. Returns the eviction count.
    pub async fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let ttl = self.inner.config.ttl;
        let mut entries = self.inner.entries.lock().await;
        let before = entries.len();
        entries.retain(|uuid, entry| {
            let keep = now.duration_since(entry.last_access) < ttl;
            if !keep {
                tracing::info!(%uuid, "dropping cached views");
            }
            keep
        });
        before - entries.len()
    }

    /// Spawn the periodic GC task. A no-op if it is already running.
    pub fn start(&self) {
        if self.inner.shutdown.is_cancelled() {
            tracing::warn!("result cache already stopped, not starting gc");
            return;
        }
        let mut gc_task = self.inner.gc_task.lock();
        if gc_task.is_some() {
            return;
        }
        let cache = self.clone();
        *gc_task = Some(tokio::spawn(async move { cache.run_gc().await }));
    }

    async fn run_gc(self) {
        let period = self.inner.config.gc_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = self.collect_garbage().await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "cache gc pass");
                    }
                }
            }
        }
    }

    /// Stop the GC task and wait for it to exit.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let task = self.inner.gc_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "cache gc task failed");
            }
        }
    }
}

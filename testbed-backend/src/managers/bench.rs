use std::sync::Arc;

use serde::{Deserialize, Serialize};
use testbed_cache::{CacheConfig, ResultCache, Views};
use testbed_job_queue::{Job, JobCallbacks, JobKind, JobProgress, JobQueue};
use testbed_jobs::{
    bench_result, BenchConfig, BenchPlots, BenchProgress, BenchResult, BenchSummary,
    BenchmarkRunner, BenchmarkTask, Plots, TestbedJob, TestbedTask,
};
use testbed_store::Store;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::configs::{ConfigEntry, ConfigLookup, ConfigRegistry};
use crate::error::ServerError;
use crate::namespaces;

/// The benchmark currently held by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchRunDesc {
    pub config: BenchConfig,
    pub progress: JobProgress<BenchProgress>,
}

/// Owns benchmark configurations, runs and results.
pub struct BenchManager {
    store: Store,
    queue: JobQueue<TestbedTask>,
    cache: ResultCache<BenchPlots>,
    configs: ConfigRegistry<BenchConfig>,
    runner: Arc<dyn BenchmarkRunner>,
}

impl BenchManager {
    pub fn new(
        store: Store,
        queue: JobQueue<TestbedTask>,
        runner: Arc<dyn BenchmarkRunner>,
        cache_config: CacheConfig,
    ) -> Self {
        let cache = ResultCache::new(
            BenchPlots::new(namespaces::BENCH_RESULTS),
            store.clone(),
            cache_config,
        );
        Self {
            configs: ConfigRegistry::new(
                store.clone(),
                namespaces::BENCH_CONFIG,
                namespaces::BENCH_CONFIG_BY_NAME,
            ),
            store,
            queue,
            cache,
            runner,
        }
    }

    /// Register persisted results with the cache and start its collector.
    pub async fn start(&self) -> Result<(), ServerError> {
        let results = self
            .store
            .entries::<BenchResult>(Some(namespaces::BENCH_RESULTS), None)
            .await?;
        let total = results.len();
        for (key, result) in results {
            if let Err(e) = self.cache.add(&result).await {
                warn!(key = %key, error = %e, "unable to register benchmark result");
            }
        }
        info!(results = total, "benchmark results loaded");
        self.cache.start();
        Ok(())
    }

    pub async fn stop(&self) {
        self.cache.stop().await;
    }

    pub async fn config_create(&self, mut config: BenchConfig) -> Result<Uuid, ServerError> {
        config.name = config.name.trim().to_owned();
        self.configs.create(&config.name, &config).await
    }

    pub async fn config_list(&self) -> Result<Vec<ConfigEntry<BenchConfig>>, ServerError> {
        self.configs.list().await
    }

    pub async fn config_get(
        &self,
        lookup: ConfigLookup<'_>,
    ) -> Result<ConfigEntry<BenchConfig>, ServerError> {
        self.configs.get(lookup).await
    }

    /// Queue a benchmark of the stored configuration `config_id`.
    pub async fn run(&self, config_id: Uuid) -> Result<Uuid, ServerError> {
        let entry = self.configs.get(ConfigLookup::Id(config_id)).await?;
        let task = BenchmarkTask::new(entry.config, Arc::clone(&self.runner));
        let run_name = task.run_name().to_owned();
        let job = Arc::new(Job::new(TestbedTask::from(task)));
        let uuid = job.uuid();

        self.queue
            .submit(job, JobKind::Benchmark, self.callbacks())
            .await;
        info!(%uuid, config = %config_id, run = %run_name, "benchmark submitted");
        Ok(uuid)
    }

    fn callbacks(&self) -> JobCallbacks<TestbedTask> {
        let store = self.store.clone();
        let cache = self.cache.clone();
        JobCallbacks::new(
            |job: Arc<TestbedJob>| async move {
                info!(uuid = %job.uuid(), "benchmark started");
            },
            move |job: Arc<TestbedJob>| {
                let store = store.clone();
                let cache = cache.clone();
                async move {
                    if let Err(e) = record_result(&store, &cache, &job).await {
                        error!(uuid = %job.uuid(), error = %e, "unable to record benchmark result");
                    }
                }
            },
        )
    }

    pub async fn current(&self) -> Option<BenchRunDesc> {
        let entry = self.queue.running().await?;
        bench_result(entry.job()).map(|result| BenchRunDesc {
            config: result.config,
            progress: result.progress,
        })
    }

    /// Summaries of every finished benchmark, oldest first.
    pub fn results(&self) -> Vec<BenchSummary> {
        let mut summaries = self.cache.summaries();
        summaries.sort_by(|a, b| {
            a.progress
                .time_start
                .cmp(&b.progress.time_start)
                .then(a.uuid.cmp(&b.uuid))
        });
        summaries
    }

    pub fn summary(&self, uuid: Uuid) -> Option<BenchSummary> {
        self.cache.summary(uuid)
    }

    pub async fn result(&self, uuid: Uuid) -> Result<BenchResult, ServerError> {
        self.store
            .get_record(Some(namespaces::BENCH_RESULTS), &uuid.to_string())
            .await?
            .ok_or_else(|| ServerError::not_found(format!("benchmark result {uuid}")))
    }

    /// Per-target plots of a finished benchmark.
    pub async fn histograms(&self, uuid: Uuid) -> Result<Arc<Views<Plots>>, ServerError> {
        Ok(self.cache.derived_views(uuid).await?)
    }
}

async fn record_result(
    store: &Store,
    cache: &ResultCache<BenchPlots>,
    job: &TestbedJob,
) -> Result<(), ServerError> {
    let Some(result) = bench_result(job) else {
        warn!(uuid = %job.uuid(), "not a benchmark job");
        return Ok(());
    };
    store
        .put(
            Some(namespaces::BENCH_RESULTS),
            &result.uuid.to_string(),
            &result,
        )
        .await?;
    let summary = cache.add(&result).await?;
    info!(
        uuid = %summary.uuid,
        is_error = summary.is_error,
        targets = summary.ops.len(),
        "benchmark result recorded"
    );
    Ok(())
}

use std::sync::Arc;

use testbed_cache::CacheConfig;
use testbed_config::Config;
use testbed_job_queue::{JobQueue, QueueConfig, WorkQueueState, WorkQueueStatus};
use testbed_jobs::{
    find_tool, BenchmarkRunner, CommandBenchRunner, CommandComplianceRunner, ComplianceRunner,
    JobConfig, JobProgressPayload, TestbedTask,
};
use testbed_store::{Store, StoreConfig};
use tracing::{info, warn};

use crate::error::ServerError;
use crate::managers::{BenchManager, ComplianceManager};

/// Everything the backend runs on, built once at startup.
pub struct ServerContext {
    store: Store,
    queue: JobQueue<TestbedTask>,
    bench: BenchManager,
    compliance: ComplianceManager,
}

impl ServerContext {
    /// Build a context driving the external tools named in `config.tools`.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        for command in [&config.tools.bench_command, &config.tools.compliance_command] {
            if find_tool(command).is_none() {
                warn!(command = %command, "tool not found, its runs will fail");
            }
        }
        Self::with_runners(
            config,
            Arc::new(CommandBenchRunner::new(config.tools.bench_command.clone())),
            Arc::new(CommandComplianceRunner::new(
                config.tools.compliance_command.clone(),
            )),
        )
    }

    pub fn with_runners(
        config: &Config,
        bench_runner: Arc<dyn BenchmarkRunner>,
        compliance_runner: Arc<dyn ComplianceRunner>,
    ) -> Result<Self, ServerError> {
        let store = Store::open(&StoreConfig::new(config.store.path.as_str()))?;
        let queue = JobQueue::new(
            QueueConfig::default()
                .with_tick(config.queue.tick())
                .with_finished_capacity(config.queue.finished_capacity),
        );
        let cache_config = CacheConfig {
            ttl: config.cache.ttl(),
            gc_interval: config.cache.gc_interval(),
        };

        Ok(Self {
            bench: BenchManager::new(store.clone(), queue.clone(), bench_runner, cache_config),
            compliance: ComplianceManager::new(store.clone(), queue.clone(), compliance_runner),
            store,
            queue,
        })
    }

    /// Reload persisted results, then start the queue and cache collector.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.bench.start().await?;
        self.compliance.start().await?;
        self.queue.start()?;
        info!(store = %self.store.path().display(), "server context started");
        Ok(())
    }

    /// Shut the queue down, then stop the cache collector.
    pub async fn stop(&self) {
        self.queue.shutdown().await;
        self.bench.stop().await;
        info!("server context stopped");
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queue(&self) -> &JobQueue<TestbedTask> {
        &self.queue
    }

    pub fn bench(&self) -> &BenchManager {
        &self.bench
    }

    pub fn compliance(&self) -> &ComplianceManager {
        &self.compliance
    }

    pub async fn queue_state(&self) -> WorkQueueState {
        self.queue.state().await
    }

    pub async fn queue_status(&self) -> WorkQueueStatus<JobProgressPayload, JobConfig> {
        self.queue.status().await
    }
}

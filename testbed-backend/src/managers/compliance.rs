use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use testbed_job_queue::{Job, JobCallbacks, JobKind, JobQueue, JobTask};
use testbed_jobs::{
    compliance_result, ComplianceConfig, ComplianceProgress, ComplianceResult, ComplianceRunner,
    ComplianceTask, TestErrorDetail, TestbedJob, TestbedTask,
};
use testbed_store::Store;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::configs::{ConfigEntry, ConfigLookup, ConfigRegistry};
use crate::error::ServerError;
use crate::namespaces;

type ResultIndex = Arc<RwLock<BTreeMap<Uuid, ComplianceResult>>>;

/// Owns compliance configurations, runs and results.
pub struct ComplianceManager {
    store: Store,
    queue: JobQueue<TestbedTask>,
    configs: ConfigRegistry<ComplianceConfig>,
    runner: Arc<dyn ComplianceRunner>,
    results: ResultIndex,
}

fn error_key(run: Uuid, test: &str) -> String {
    format!("{run}/{test}")
}

impl ComplianceManager {
    pub fn new(store: Store, queue: JobQueue<TestbedTask>, runner: Arc<dyn ComplianceRunner>) -> Self {
        Self {
            configs: ConfigRegistry::new(
                store.clone(),
                namespaces::COMPLIANCE_CONFIG,
                namespaces::COMPLIANCE_CONFIG_BY_NAME,
            ),
            store,
            queue,
            runner,
            results: ResultIndex::default(),
        }
    }

    /// Load persisted run results.
    pub async fn start(&self) -> Result<(), ServerError> {
        let entries = self
            .store
            .entries::<ComplianceResult>(Some(namespaces::COMPLIANCE_RESULTS), None)
            .await?;
        let mut results = self.results.write();
        for (key, result) in entries {
            if key != result.uuid.to_string() {
                warn!(key = %key, uuid = %result.uuid, "compliance result stored under a foreign key");
            }
            results.insert(result.uuid, result);
        }
        info!(results = results.len(), "compliance results loaded");
        Ok(())
    }

    pub async fn config_create(&self, mut config: ComplianceConfig) -> Result<Uuid, ServerError> {
        config.name = config.name.trim().to_owned();
        self.configs.create(&config.name, &config).await
    }

    pub async fn config_list(&self) -> Result<Vec<ConfigEntry<ComplianceConfig>>, ServerError> {
        self.configs.list().await
    }

    pub async fn config_get(
        &self,
        lookup: ConfigLookup<'_>,
    ) -> Result<ConfigEntry<ComplianceConfig>, ServerError> {
        self.configs.get(lookup).await
    }

    /// Queue a compliance run of the stored configuration `config_id`.
    pub async fn run(&self, config_id: Uuid) -> Result<Uuid, ServerError> {
        let entry = self.configs.get(ConfigLookup::Id(config_id)).await?;
        let task = ComplianceTask::new(entry.config, Arc::clone(&self.runner));
        let run_name = task.run_name().to_owned();
        let job = Arc::new(Job::new(TestbedTask::from(task)));
        let uuid = job.uuid();

        self.queue
            .submit(job, JobKind::Compliance, self.callbacks())
            .await;
        info!(%uuid, config = %config_id, run = %run_name, "compliance run submitted");
        Ok(uuid)
    }

    fn callbacks(&self) -> JobCallbacks<TestbedTask> {
        let store = self.store.clone();
        let results = Arc::clone(&self.results);
        JobCallbacks::new(
            |job: Arc<TestbedJob>| async move {
                info!(uuid = %job.uuid(), "compliance run started");
            },
            move |job: Arc<TestbedJob>| {
                let store = store.clone();
                let results = Arc::clone(&results);
                async move {
                    if let Err(e) = record_result(&store, &results, &job).await {
                        error!(uuid = %job.uuid(), error = %e, "unable to record compliance result");
                    }
                }
            },
        )
    }

    /// Progress of the compliance run currently held by the queue.
    pub async fn current(&self) -> Option<ComplianceProgress> {
        let entry = self.queue.running().await?;
        match entry.job().task() {
            TestbedTask::Compliance(task) => Some(task.progress()),
            _ => None,
        }
    }

    pub fn results(&self) -> BTreeMap<Uuid, ComplianceResult> {
        self.results.read().clone()
    }

    pub fn result(&self, uuid: Uuid) -> Result<ComplianceResult, ServerError> {
        self.results
            .read()
            .get(&uuid)
            .cloned()
            .ok_or_else(|| ServerError::not_found(format!("compliance result {uuid}")))
    }

    pub async fn test_error(&self, run: Uuid, test: &str) -> Result<TestErrorDetail, ServerError> {
        self.store
            .get_record(Some(namespaces::COMPLIANCE_ERRORS), &error_key(run, test))
            .await?
            .ok_or_else(|| ServerError::not_found(format!("error detail for {test} in run {run}")))
    }

    /// Every failure detail recorded for `run`, keyed by test name.
    pub async fn test_errors(&self, run: Uuid) -> Result<BTreeMap<String, TestErrorDetail>, ServerError> {
        let prefix = error_key(run, "");
        let entries = self
            .store
            .entries::<TestErrorDetail>(Some(namespaces::COMPLIANCE_ERRORS), Some(&prefix))
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, detail)| {
                key.strip_prefix(&prefix)
                    .map(|test| (test.to_owned(), detail))
            })
            .collect())
    }
}

async fn record_result(
    store: &Store,
    results: &ResultIndex,
    job: &TestbedJob,
) -> Result<(), ServerError> {
    let Some(result) = compliance_result(job) else {
        warn!(uuid = %job.uuid(), "not a compliance job");
        return Ok(());
    };
    let mut tx = store.transaction().await;
    tx.put(
        Some(namespaces::COMPLIANCE_RESULTS),
        &result.uuid.to_string(),
        &result,
    )
    .await?;
    for (test, detail) in &result.errors {
        debug!(uuid = %result.uuid, test = %test, "storing test failure");
        tx.put(
            Some(namespaces::COMPLIANCE_ERRORS),
            &error_key(result.uuid, test),
            detail,
        )
        .await?;
    }
    drop(tx);

    info!(
        uuid = %result.uuid,
        is_error = result.is_error,
        tests = result.results.len(),
        failures = result.errors.len(),
        "compliance result recorded"
    );
    results.write().insert(result.uuid, result);
    Ok(())
}

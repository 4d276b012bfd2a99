//! The benchmark job: runs every configured target in turn.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use testbed_job_queue::{async_trait, JobError, JobTask};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bench::runner::BenchmarkRunner;
use crate::bench::types::{
    BenchConfig, BenchOutput, BenchProgress, BenchTarget, BenchTargetError, TargetProgress,
    TargetSpec, TargetState,
};
use crate::error::RunnerError;

/// Host ports handed out to benchmark targets.
pub const HOST_PORT_RANGE: Range<u16> = 54780..54880;

#[derive(Debug, Default)]
struct BenchState {
    targets: BTreeMap<String, TargetProgress>,
    results: BTreeMap<String, String>,
}

pub struct BenchmarkTask {
    run_name: String,
    config: BenchConfig,
    runner: Arc<dyn BenchmarkRunner>,
    state: Mutex<BenchState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BenchmarkTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkTask")
            .field("run_name", &self.run_name)
            .field("config", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl BenchmarkTask {
    pub fn new(config: BenchConfig, runner: Arc<dyn BenchmarkRunner>) -> Self {
        let targets = config
            .targets
            .keys()
            .map(|name| (name.clone(), TargetProgress::new(name.clone())))
            .collect();
        Self {
            run_name: format!("benchmark-{}", Utc::now().format("%Y%m%d-%H%M%S")),
            config,
            runner,
            state: Mutex::new(BenchState {
                targets,
                results: BTreeMap::new(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    fn with_target(&self, name: &str, f: impl FnOnce(&mut TargetProgress)) {
        if let Some(target) = self.state.lock().targets.get_mut(name) {
            f(target);
        }
    }

    async fn run_target(&self, name: &str, target: &BenchTarget) {
        let spec = TargetSpec {
            name: name.to_owned(),
            target: target.clone(),
            host_port: rand::random_range(HOST_PORT_RANGE),
        };
        info!(run = %self.run_name, target_name = name, host = %spec.host(), "benchmarking target");
        self.with_target(name, TargetProgress::begin);

        let progress = |state: TargetState, value: f64| self.with_target(name, |t| t.update(state, value));
        let outcome = tokio::select! {
            res = self.runner.run(&self.run_name, &spec, &self.config.params, &progress) => res,
            _ = self.cancel.cancelled() => Err(RunnerError::Cancelled),
        };

        match outcome {
            Ok(samples) => {
                self.state.lock().results.insert(name.to_owned(), samples);
                self.with_target(name, |t| t.finish(None));
                info!(run = %self.run_name, target_name = name, "target finished");
            }
            Err(e) => {
                error!(run = %self.run_name, target_name = name, error = %e, "error running benchmark target");
                self.with_target(name, |t| t.finish(Some(e.to_string())));
            }
        }
    }
}

#[async_trait]
impl JobTask for BenchmarkTask {
    type Config = BenchConfig;
    type Progress = BenchProgress;
    type Results = BenchOutput;

    async fn execute(&self) -> Result<(), JobError> {
        self.runner.check().await.map_err(|e| {
            error!(run = %self.run_name, error = %e, "benchmark tool unavailable");
            JobError::failed(e.to_string())
        })?;

        info!(
            run = %self.run_name,
            config = %self.config.name,
            targets = self.config.targets.len(),
            "benchmark started"
        );
        for (name, target) in &self.config.targets {
            if self.cancel.is_cancelled() {
                warn!(run = %self.run_name, "benchmark cancelled, skipping remaining targets");
                break;
            }
            self.run_target(name, target).await;
        }
        Ok(())
    }

    async fn cancel(&self) {
        self.cancel.cancel();
        self.runner.cancel().await;

        let mut state = self.state.lock();
        for target in state.targets.values_mut().filter(|t| !t.is_done) {
            target.is_running = false;
            target.is_done = true;
            if target.time_start.is_some() && target.time_end.is_none() {
                target.time_end = Some(Utc::now());
            }
        }
    }

    fn config(&self) -> BenchConfig {
        self.config.clone()
    }

    fn progress(&self) -> BenchProgress {
        BenchProgress {
            targets: self
                .state
                .lock()
                .targets
                .values()
                .map(TargetProgress::snapshot)
                .collect(),
        }
    }

    fn results(&self) -> BenchOutput {
        let state = self.state.lock();
        BenchOutput {
            errors: state
                .targets
                .values()
                .filter_map(|t| {
                    t.error_str.as_ref().filter(|_| t.is_error).map(|e| BenchTargetError {
                        target: t.name.clone(),
                        error_str: e.clone(),
                    })
                })
                .collect(),
            results: state.results.clone(),
        }
    }
}

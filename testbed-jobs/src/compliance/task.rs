//! The compliance job: one suite run against one containerized target.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use testbed_job_queue::{async_trait, JobError, JobTask};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bench::HOST_PORT_RANGE;
use crate::compliance::runner::ComplianceRunner;
use crate::compliance::types::{ComplianceConfig, ComplianceOutput, ComplianceProgress, ContainerSpec};
use crate::error::RunnerError;

#[derive(Debug, Default)]
struct ComplianceState {
    tests_total: u64,
    tests_run: u64,
    output: ComplianceOutput,
}

pub struct ComplianceTask {
    run_name: String,
    config: ComplianceConfig,
    runner: Arc<dyn ComplianceRunner>,
    state: Mutex<ComplianceState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ComplianceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceTask")
            .field("run_name", &self.run_name)
            .field("config", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl ComplianceTask {
    pub fn new(config: ComplianceConfig, runner: Arc<dyn ComplianceRunner>) -> Self {
        Self {
            run_name: format!("s3tests-{}", Utc::now().format("%Y%m%dT%H%M%S")),
            config,
            runner,
            state: Mutex::new(ComplianceState::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    fn on_progress(&self, total: u64, run: u64) {
        let mut state = self.state.lock();
        state.tests_total = total;
        state.tests_run = run;
        debug!(run = %self.run_name, total, done = run, "compliance progress");
    }
}

#[async_trait]
impl JobTask for ComplianceTask {
    type Config = ComplianceConfig;
    type Progress = ComplianceProgress;
    type Results = ComplianceOutput;

    async fn execute(&self) -> Result<(), JobError> {
        self.runner.check().await.map_err(|e| {
            error!(run = %self.run_name, error = %e, "compliance tool unavailable");
            JobError::failed(e.to_string())
        })?;

        let spec = ContainerSpec {
            name: self.run_name.clone(),
            host_port: rand::random_range(HOST_PORT_RANGE),
            container: self.config.container.clone(),
        };
        info!(
            run = %self.run_name,
            image = %spec.container.image,
            suite = %self.config.tests.suite,
            "compliance run started"
        );

        let progress = |total: u64, run: u64| self.on_progress(total, run);
        let outcome = tokio::select! {
            res = self.runner.run(&self.run_name, &spec, &self.config.tests, &progress) => res,
            _ = self.cancel.cancelled() => Err(RunnerError::Cancelled),
        };

        match outcome {
            Ok(output) => {
                info!(
                    run = %self.run_name,
                    tests = output.results.len(),
                    failures = output.errors.len(),
                    "compliance run finished"
                );
                self.state.lock().output = output;
                Ok(())
            }
            Err(e) => {
                error!(run = %self.run_name, error = %e, "error running compliance suite");
                Err(JobError::failed(e.to_string()))
            }
        }
    }

    async fn cancel(&self) {
        self.cancel.cancel();
        self.runner.cancel().await;
    }

    fn config(&self) -> ComplianceConfig {
        self.config.clone()
    }

    fn progress(&self) -> ComplianceProgress {
        let state = self.state.lock();
        ComplianceProgress::new(state.tests_total, state.tests_run)
    }

    fn results(&self) -> ComplianceOutput {
        self.state.lock().output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::types::{ContainerConfig, TestErrorDetail, TestsConfig};
    use crate::compliance::ComplianceProgressFn;
    use std::collections::BTreeMap;

    struct FakeSuite {
        installed: bool,
    }

    #[async_trait]
    impl ComplianceRunner for FakeSuite {
        async fn check(&self) -> Result<(), RunnerError> {
            if self.installed {
                Ok(())
            } else {
                Err(RunnerError::ToolNotFound("s3tests".into()))
            }
        }

        async fn run(
            &self,
            _run_name: &str,
            container: &ContainerSpec,
            tests: &TestsConfig,
            progress: ComplianceProgressFn<'_>,
        ) -> Result<ComplianceOutput, RunnerError> {
            assert_eq!(container.container.target_port, 7480);
            assert_eq!(tests.suite, "s3tests_boto3.functional");
            progress(2, 1);
            progress(2, 2);
            Ok(ComplianceOutput {
                results: vec![
                    ("test_bucket_list".into(), "ok".into()),
                    ("test_object_put".into(), "fail".into()),
                ],
                errors: BTreeMap::from([(
                    "test_object_put".into(),
                    TestErrorDetail {
                        name: "test_object_put".into(),
                        trace: vec!["AssertionError".into()],
                        log: vec![],
                    },
                )]),
            })
        }
    }

    fn config() -> ComplianceConfig {
        ComplianceConfig {
            name: "nightly".into(),
            container: ContainerConfig {
                image: "s3gw".into(),
                target_port: 7480,
            },
            tests: TestsConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_run_collects_output() {
        let task = ComplianceTask::new(config(), Arc::new(FakeSuite { installed: true }));
        task.execute().await.unwrap();

        let progress = task.progress();
        assert_eq!((progress.tests_total, progress.tests_run), (2, 2));
        assert_eq!(progress.percent, 100.0);
        let output = task.results();
        assert_eq!(output.results.len(), 2);
        assert!(output.errors.contains_key("test_object_put"));
    }

    #[tokio::test]
    async fn test_missing_tool_fails_job() {
        let task = ComplianceTask::new(config(), Arc::new(FakeSuite { installed: false }));
        let err = task.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "tool not found");
        assert!(task.results().results.is_empty());
    }
}

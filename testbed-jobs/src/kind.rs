//! The closed set of job kinds run by the queue.

use serde::{Deserialize, Serialize};
use testbed_job_queue::{async_trait, Job, JobError, JobKind, JobProgress, JobTask};

use crate::bench::{BenchConfig, BenchOutput, BenchProgress, BenchResult, BenchmarkTask};
use crate::compliance::{
    ComplianceConfig, ComplianceOutput, ComplianceProgress, ComplianceResult, ComplianceTask,
};

#[derive(Debug)]
pub enum TestbedTask {
    Benchmark(BenchmarkTask),
    Compliance(ComplianceTask),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobConfig {
    Benchmark(BenchConfig),
    Compliance(ComplianceConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobProgressPayload {
    Benchmark(BenchProgress),
    Compliance(ComplianceProgress),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobResults {
    Benchmark(BenchOutput),
    Compliance(ComplianceOutput),
}

/// Queue job carrying any [`TestbedTask`].
pub type TestbedJob = Job<TestbedTask>;

impl TestbedTask {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Benchmark(_) => JobKind::Benchmark,
            Self::Compliance(_) => JobKind::Compliance,
        }
    }
}

impl From<BenchmarkTask> for TestbedTask {
    fn from(task: BenchmarkTask) -> Self {
        Self::Benchmark(task)
    }
}

impl From<ComplianceTask> for TestbedTask {
    fn from(task: ComplianceTask) -> Self {
        Self::Compliance(task)
    }
}

#[async_trait]
impl JobTask for TestbedTask {
    type Config = JobConfig;
    type Progress = JobProgressPayload;
    type Results = JobResults;

    async fn execute(&self) -> Result<(), JobError> {
        match self {
            Self::Benchmark(task) => task.execute().await,
            Self::Compliance(task) => task.execute().await,
        }
    }

    async fn cancel(&self) {
        match self {
            Self::Benchmark(task) => task.cancel().await,
            Self::Compliance(task) => task.cancel().await,
        }
    }

    fn config(&self) -> JobConfig {
        match self {
            Self::Benchmark(task) => JobConfig::Benchmark(task.config()),
            Self::Compliance(task) => JobConfig::Compliance(task.config()),
        }
    }

    fn progress(&self) -> JobProgressPayload {
        match self {
            Self::Benchmark(task) => JobProgressPayload::Benchmark(task.progress()),
            Self::Compliance(task) => JobProgressPayload::Compliance(task.progress()),
        }
    }

    fn results(&self) -> JobResults {
        match self {
            Self::Benchmark(task) => JobResults::Benchmark(task.results()),
            Self::Compliance(task) => JobResults::Compliance(task.results()),
        }
    }
}

fn with_payload<P, Q>(progress: JobProgress<P>, payload: Q) -> JobProgress<Q> {
    JobProgress {
        uuid: progress.uuid,
        is_running: progress.is_running,
        is_done: progress.is_done,
        time_start: progress.time_start,
        time_end: progress.time_end,
        duration: progress.duration,
        progress: payload,
    }
}

/// Build the persisted benchmark record of `job`, or `None` for other kinds.
pub fn bench_result(job: &TestbedJob) -> Option<BenchResult> {
    let TestbedTask::Benchmark(task) = job.task() else {
        return None;
    };
    let outcome = job.results();
    let progress = job.progress();
    let output = task.results();
    Some(BenchResult {
        uuid: job.uuid(),
        progress: with_payload(progress, task.progress()),
        is_error: outcome.is_error || !output.errors.is_empty(),
        error: outcome.error,
        errors: output.errors,
        config: task.config(),
        results: output.results,
    })
}

/// Build the persisted compliance record of `job`, or `None` for other kinds.
pub fn compliance_result(job: &TestbedJob) -> Option<ComplianceResult> {
    let TestbedTask::Compliance(task) = job.task() else {
        return None;
    };
    let outcome = job.results();
    let output = task.results();
    Some(ComplianceResult {
        uuid: job.uuid(),
        time_start: job.time_start(),
        time_end: job.time_end(),
        is_error: outcome.is_error,
        error: outcome.error,
        results: output.results,
        errors: output.errors,
    })
}

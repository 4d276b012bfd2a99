//! Concrete job kinds for the testbed backend.
//!
//! Two kinds of job run on the queue: storage-throughput benchmarks against
//! one or more containerized targets, and functional compatibility test
//! suites against a single target. Both drive an external tool through a
//! runner trait so the tool can be swapped out in tests.
//!
//! # Job Kinds
//!
//! - [`BenchmarkTask`] - Run the benchmark tool against each configured target
//! - [`ComplianceTask`] - Run a test suite against one container
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use testbed_job_queue::{Job, JobCallbacks, JobQueue};
//! use testbed_jobs::{BenchConfig, BenchmarkTask, CommandBenchRunner, TestbedTask};
//!
//! # async fn example(config: BenchConfig) {
//! let queue: JobQueue<TestbedTask> = JobQueue::default();
//! queue.start().unwrap();
//!
//! let task = TestbedTask::from(BenchmarkTask::new(config, Arc::new(CommandBenchRunner::new("testbed-bench"))));
//! let kind = task.kind();
//! queue.submit(Arc::new(Job::new(task)), kind, JobCallbacks::noop()).await;
//! # }
//! ```

mod bench;
mod command;
mod compliance;
mod error;
mod kind;

pub use bench::{
    BenchConfig, BenchOutput, BenchParams, BenchPlots, BenchProgress, BenchProgressFn,
    BenchResult, BenchSummary, BenchTarget, BenchTargetError, BenchmarkRunner, BenchmarkTask,
    Histogram, Plots, TargetOps, TargetProgress, TargetSpec, TargetState, HOST_PORT_RANGE,
};
pub use command::{find_tool, CommandBenchRunner, CommandComplianceRunner};
pub use compliance::{
    ComplianceConfig, ComplianceOutput, ComplianceProgress, ComplianceProgressFn,
    ComplianceResult, ComplianceRunner, ComplianceTask, ContainerConfig, ContainerSpec,
    TestErrorDetail, TestsConfig, DEFAULT_SUITE,
};
pub use error::RunnerError;
pub use kind::{
    bench_result, compliance_result, JobConfig, JobProgressPayload, JobResults, TestbedJob,
    TestbedTask,
};

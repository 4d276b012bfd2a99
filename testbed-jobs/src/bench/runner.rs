use async_trait::async_trait;

use crate::bench::types::{BenchParams, TargetSpec, TargetState};
use crate::error::RunnerError;

/// Progress sink handed to a runner: current state and percentage.
pub type BenchProgressFn<'a> = &'a (dyn Fn(TargetState, f64) + Send + Sync);

/// Drives the external benchmark tool against one target at a time.
#[async_trait]
pub trait BenchmarkRunner: Send + Sync {
    /// Verify the tool is usable before any target is started.
    async fn check(&self) -> Result<(), RunnerError>;

    /// Benchmark a single target and return its raw samples as JSON.
    async fn run(
        &self,
        run_name: &str,
        target: &TargetSpec,
        params: &BenchParams,
        progress: BenchProgressFn<'_>,
    ) -> Result<String, RunnerError>;

    /// Best-effort abort of an in-flight [`run`](Self::run).
    async fn cancel(&self) {}
}

use async_trait::async_trait;

use crate::compliance::types::{ComplianceOutput, ContainerSpec, TestsConfig};
use crate::error::RunnerError;

/// Progress sink handed to a runner: total tests and tests run so far.
pub type ComplianceProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Drives the external test suite against a containerized target.
#[async_trait]
pub trait ComplianceRunner: Send + Sync {
    async fn check(&self) -> Result<(), RunnerError>;

    async fn run(
        &self,
        run_name: &str,
        container: &ContainerSpec,
        tests: &TestsConfig,
        progress: ComplianceProgressFn<'_>,
    ) -> Result<ComplianceOutput, RunnerError>;

    async fn cancel(&self) {}
}

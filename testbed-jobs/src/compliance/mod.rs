//! Functional compatibility test-suite jobs.

mod runner;
mod task;
mod types;

pub use runner::{ComplianceProgressFn, ComplianceRunner};
pub use task::ComplianceTask;
pub use types::{
    ComplianceConfig, ComplianceOutput, ComplianceProgress, ComplianceResult, ContainerConfig,
    ContainerSpec, TestErrorDetail, TestsConfig, DEFAULT_SUITE,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SUITE: &str = "s3tests_boto3.functional";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,
    pub target_port: u16,
}

/// Which tests of the suite to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestsConfig {
    #[serde(default = "default_suite")]
    pub suite: String,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

fn default_suite() -> String {
    DEFAULT_SUITE.to_owned()
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            suite: default_suite(),
            ignore: Vec::new(),
            exclude: Vec::new(),
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    pub name: String,
    pub container: ContainerConfig,
    #[serde(default)]
    pub tests: TestsConfig,
}

/// The container as handed to a runner, with its host port resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub host_port: u16,
    pub container: ContainerConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceProgress {
    pub tests_total: u64,
    pub tests_run: u64,
    pub percent: f64,
}

impl ComplianceProgress {
    pub fn new(tests_total: u64, tests_run: u64) -> Self {
        let percent = if tests_total == 0 {
            100.0
        } else {
            tests_run as f64 * 100.0 / tests_total as f64
        };
        Self {
            tests_total,
            tests_run,
            percent,
        }
    }
}

/// Captured failure detail of a single test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestErrorDetail {
    pub name: String,
    pub trace: Vec<String>,
    pub log: Vec<String>,
}

/// What a compliance run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceOutput {
    /// `(test, status)` pairs in execution order.
    pub results: Vec<(String, String)>,
    pub errors: BTreeMap<String, TestErrorDetail>,
}

/// The persisted record of a compliance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub uuid: Uuid,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub is_error: bool,
    pub error: Option<String>,
    pub results: Vec<(String, String)>,
    #[serde(default)]
    pub errors: BTreeMap<String, TestErrorDetail>,
}

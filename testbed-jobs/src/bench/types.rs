use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testbed_job_queue::JobProgress;
use uuid::Uuid;

/// Load parameters shared by every target of a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchParams {
    pub num_objects: u64,
    /// Object size as understood by the tool, e.g. `"1MiB"`.
    pub object_size: String,
    /// Run duration as understood by the tool, e.g. `"5m"`.
    pub duration: String,
}

/// A containerized storage endpoint to benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchTarget {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    /// Port the service listens on inside the container.
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub name: String,
    pub params: BenchParams,
    pub targets: BTreeMap<String, BenchTarget>,
}

/// A target as handed to a runner, with its host port resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub name: String,
    pub target: BenchTarget,
    pub host_port: u16,
}

impl TargetSpec {
    pub fn host(&self) -> String {
        format!("127.0.0.1:{}", self.host_port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    #[default]
    None,
    Preparing,
    Running,
    Cleanup,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProgress {
    pub name: String,
    pub state: TargetState,
    /// Percentage reported by the tool for the current state.
    pub value: f64,
    pub has_progress: bool,
    pub is_running: bool,
    pub is_done: bool,
    pub is_error: bool,
    pub error_str: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub duration: i64,
}

impl TargetProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TargetState::None,
            value: 0.0,
            has_progress: false,
            is_running: false,
            is_done: false,
            is_error: false,
            error_str: None,
            time_start: None,
            time_end: None,
            duration: 0,
        }
    }

    pub(crate) fn update(&mut self, state: TargetState, value: f64) {
        self.has_progress = true;
        self.state = state;
        self.value = value;
    }

    pub(crate) fn begin(&mut self) {
        self.is_running = true;
        self.time_start = Some(Utc::now());
    }

    pub(crate) fn finish(&mut self, error: Option<String>) {
        self.is_running = false;
        self.is_done = true;
        self.time_end.get_or_insert_with(Utc::now);
        if let Some(e) = error {
            self.is_error = true;
            self.error_str = Some(e);
        } else {
            self.state = TargetState::Done;
        }
    }

    /// Copy with `duration` measured up to now.
    pub(crate) fn snapshot(&self) -> Self {
        let mut copy = self.clone();
        if let Some(start) = copy.time_start {
            copy.duration = (copy.time_end.unwrap_or_else(Utc::now) - start).num_seconds();
        }
        copy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchProgress {
    pub targets: Vec<TargetProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchTargetError {
    pub target: String,
    pub error_str: String,
}

/// What a benchmark task produced, independent of the job wrapping it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchOutput {
    pub errors: Vec<BenchTargetError>,
    /// Raw samples per target, as a JSON array of operation records.
    pub results: BTreeMap<String, String>,
}

/// The persisted record of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub uuid: Uuid,
    pub progress: JobProgress<BenchProgress>,
    pub is_error: bool,
    /// Job-level failure, such as the tool missing before any target ran.
    #[serde(default)]
    pub error: Option<String>,
    pub errors: Vec<BenchTargetError>,
    pub config: BenchConfig,
    pub results: BTreeMap<String, String>,
}

//! Core types for the job queue system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind tag attached to every queued job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Benchmark,
    Compliance,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Benchmark => "benchmark",
            Self::Compliance => "compliance",
        })
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Created,
    Running,
    Done,
}

impl JobState {
    /// Returns true if this state is terminal.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Done => "done",
        })
    }
}

/// Point-in-time progress of a job, with its kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress<P> {
    pub uuid: Uuid,
    pub is_running: bool,
    pub is_done: bool,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    /// Elapsed seconds; measured up to now while the job is still running.
    pub duration: i64,
    pub progress: P,
}

/// Outcome of a job: its error state plus kind-specific results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome<R> {
    pub uuid: Uuid,
    pub is_error: bool,
    pub error: Option<String>,
    pub results: R,
}

/// Compact description of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusItem {
    pub uuid: Uuid,
    pub kind: JobKind,
    pub is_running: bool,
    pub is_done: bool,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub duration: i64,
}

/// Snapshot of the whole queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkQueueState {
    pub waiting: Vec<JobStatusItem>,
    pub finished: Vec<JobStatusItem>,
    pub current: Option<JobStatusItem>,
}

/// The running entry with its progress and configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueStatusEntry<P, C> {
    pub item: JobStatusItem,
    pub progress: JobProgress<P>,
    pub config: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueStatus<P, C> {
    pub is_running: bool,
    pub current: Option<WorkQueueStatusEntry<P, C>>,
}

pub(crate) fn elapsed_secs(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> i64 {
    match start {
        None => 0,
        Some(start) => (end.unwrap_or_else(Utc::now) - start).num_seconds(),
    }
}

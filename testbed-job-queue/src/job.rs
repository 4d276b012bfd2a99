//! The job lifecycle wrapper and the task contract it drives.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::JobError;
use crate::types::{elapsed_secs, JobOutcome, JobProgress, JobState};

/// The kind-specific work behind a [`Job`].
///
/// Implementations own their progress and results behind interior
/// mutability; the queue only ever holds a shared reference.
#[async_trait]
pub trait JobTask: Send + Sync + 'static {
    type Config: Clone + Send + Sync + 'static;
    type Progress: Clone + Send + Sync + 'static;
    type Results: Clone + Send + Sync + 'static;

    /// Perform the work. Errors are captured on the job, never propagated.
    async fn execute(&self) -> Result<(), JobError>;

    /// Best-effort request to abandon an in-flight [`execute`](Self::execute).
    async fn cancel(&self) {}

    fn config(&self) -> Self::Config;

    fn progress(&self) -> Self::Progress;

    fn results(&self) -> Self::Results;
}

#[derive(Debug, Default, Clone)]
struct Lifecycle {
    state: JobState,
    error: Option<String>,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
}

/// A unit of work with a uuid, a lifecycle and a captured error.
///
/// `run` may be entered at most once. Once the job reaches
/// [`JobState::Done`] it never changes state again.
pub struct Job<T: JobTask> {
    uuid: Uuid,
    task: T,
    lifecycle: Mutex<Lifecycle>,
}

impl<T: JobTask> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("uuid", &self.uuid)
            .field("lifecycle", &*self.lifecycle.lock())
            .finish_non_exhaustive()
    }
}

impl<T: JobTask> Job<T> {
    pub fn new(task: T) -> Self {
        Self::with_id(Uuid::new_v4(), task)
    }

    pub fn with_id(uuid: Uuid, task: T) -> Self {
        Self {
            uuid,
            task,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn state(&self) -> JobState {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn error(&self) -> Option<String> {
        self.lifecycle.lock().error.clone()
    }

    pub fn time_start(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().time_start
    }

    pub fn time_end(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().time_end
    }

    /// Elapsed seconds, or seconds so far while still running.
    pub fn duration(&self) -> i64 {
        let lc = self.lifecycle.lock();
        elapsed_secs(lc.time_start, lc.time_end)
    }

    pub fn config(&self) -> T::Config {
        self.task.config()
    }

    pub fn progress(&self) -> JobProgress<T::Progress> {
        let lc = self.lifecycle.lock().clone();
        JobProgress {
            uuid: self.uuid,
            is_running: lc.state == JobState::Running,
            is_done: lc.state.is_terminal(),
            time_start: lc.time_start,
            time_end: lc.time_end,
            duration: elapsed_secs(lc.time_start, lc.time_end),
            progress: self.task.progress(),
        }
    }

    pub fn results(&self) -> JobOutcome<T::Results> {
        let error = self.error();
        JobOutcome {
            uuid: self.uuid,
            is_error: error.is_some(),
            error,
            results: self.task.results(),
        }
    }

    /// Execute the task, capturing any failure or panic as the job's error.
    pub async fn run(&self) {
        {
            let mut lc = self.lifecycle.lock();
            if lc.state != JobState::Created {
                tracing::warn!(uuid = %self.uuid, state = %lc.state, "job already started, ignoring run");
                return;
            }
            lc.state = JobState::Running;
            lc.time_start = Some(Utc::now());
        }
        tracing::debug!(uuid = %self.uuid, "job running");

        let error = match AssertUnwindSafe(self.task.execute()).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(JobError::Panicked(panic_message(panic.as_ref()))),
        };

        let mut lc = self.lifecycle.lock();
        if let Some(e) = error {
            tracing::warn!(uuid = %self.uuid, error = %e, "job failed");
            lc.error.get_or_insert_with(|| e.to_string());
        }
        lc.state = JobState::Done;
        lc.time_end.get_or_insert_with(Utc::now);
        tracing::debug!(uuid = %self.uuid, "job done");
    }

    /// Request cancellation of a running job and force it to `Done`.
    ///
    /// Has no effect unless the job is currently running.
    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        tracing::info!(uuid = %self.uuid, "stopping job");
        self.task.cancel().await;

        let mut lc = self.lifecycle.lock();
        lc.state = JobState::Done;
        lc.time_end.get_or_insert_with(Utc::now);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

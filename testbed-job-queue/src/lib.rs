//! Single-flight job queue and the job lifecycle contract.
//!
//! Jobs wait in FIFO order and run one at a time on a background driver.
//! Failures inside a job never escape the queue; they are captured on the
//! job and reported through its outcome.
//!
//! # Architecture
//!
//! - [`JobTask`] - Trait for the kind-specific work behind a job
//! - [`Job`] - Lifecycle wrapper: uuid, state, timing and captured error
//! - [`JobQueue`] - The FIFO queue and its driver
//! - [`JobCallbacks`] - Start and finish hooks supplied per submission
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use testbed_job_queue::{Job, JobCallbacks, JobError, JobKind, JobQueue, JobTask};
//! use async_trait::async_trait;
//!
//! struct Sleep;
//!
//! #[async_trait]
//! impl JobTask for Sleep {
//!     type Config = ();
//!     type Progress = ();
//!     type Results = ();
//!
//!     async fn execute(&self) -> Result<(), JobError> {
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!         Ok(())
//!     }
//!
//!     fn config(&self) {}
//!     fn progress(&self) {}
//!     fn results(&self) {}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = JobQueue::default();
//!     queue.start().unwrap();
//!
//!     let job = Arc::new(Job::new(Sleep));
//!     let callbacks = JobCallbacks::new(
//!         |job: Arc<Job<Sleep>>| async move { println!("started {}", job.uuid()) },
//!         |job: Arc<Job<Sleep>>| async move { println!("finished {}", job.uuid()) },
//!     );
//!     queue.submit(job, JobKind::Benchmark, callbacks).await;
//!
//!     queue.shutdown().await;
//! }
//! ```

mod callbacks;
mod config;
mod error;
mod job;
mod queue;
mod types;

pub use callbacks::JobCallbacks;
pub use config::{QueueConfig, DEFAULT_FINISHED_CAPACITY, DEFAULT_TICK};
pub use error::{JobError, JobQueueError};
pub use job::{Job, JobTask};
pub use queue::{JobQueue, QueueEntry};
pub use types::{
    JobKind, JobOutcome, JobProgress, JobState, JobStatusItem, WorkQueueState, WorkQueueStatus,
    WorkQueueStatusEntry,
};

// Re-export async_trait for convenience when implementing JobTask
pub use async_trait::async_trait;

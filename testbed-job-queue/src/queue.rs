//! Single-flight FIFO queue and its background driver.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::callbacks::JobCallbacks;
use crate::config::QueueConfig;
use crate::error::JobQueueError;
use crate::job::{Job, JobTask};
use crate::types::{JobKind, JobStatusItem, WorkQueueState, WorkQueueStatus, WorkQueueStatusEntry};

/// A job as held by the queue, with its kind tag and callbacks.
pub struct QueueEntry<T: JobTask> {
    job: Arc<Job<T>>,
    kind: JobKind,
    callbacks: JobCallbacks<T>,
}

impl<T: JobTask> Clone for QueueEntry<T> {
    fn clone(&self) -> Self {
        Self {
            job: Arc::clone(&self.job),
            kind: self.kind,
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<T: JobTask> std::fmt::Debug for QueueEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("uuid", &self.job.uuid())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T: JobTask> QueueEntry<T> {
    #[inline]
    pub fn job(&self) -> &Arc<Job<T>> {
        &self.job
    }

    #[inline]
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn status_item(&self) -> JobStatusItem {
        let progress = self.job.progress();
        JobStatusItem {
            uuid: progress.uuid,
            kind: self.kind,
            is_running: progress.is_running,
            is_done: progress.is_done,
            time_start: progress.time_start,
            time_end: progress.time_end,
            duration: progress.duration,
        }
    }
}

struct QueueState<T: JobTask> {
    waiting: VecDeque<QueueEntry<T>>,
    running: Option<QueueEntry<T>>,
    running_task: Option<JoinHandle<()>>,
    finished: VecDeque<QueueEntry<T>>,
    shutting_down: bool,
}

struct Shared<T: JobTask> {
    state: Mutex<QueueState<T>>,
    wake: Notify,
    shutdown: CancellationToken,
    config: QueueConfig,
    driver: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// A FIFO work queue that runs at most one job at a time.
///
/// A background driver, started by [`start`](Self::start), promotes the
/// oldest waiting job when nothing is running and retires the running job
/// once it reports `Done`. The driver wakes on every tick and whenever a job
/// is submitted or completes.
pub struct JobQueue<T: JobTask> {
    shared: Arc<Shared<T>>,
}

impl<T: JobTask> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: JobTask> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl<T: JobTask> JobQueue<T> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    waiting: VecDeque::new(),
                    running: None,
                    running_task: None,
                    finished: VecDeque::new(),
                    shutting_down: false,
                }),
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
                config,
                driver: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Spawn the driver. Calling this on a started queue is a no-op.
    pub fn start(&self) -> Result<(), JobQueueError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(JobQueueError::ShuttingDown);
        }
        let mut driver = self.shared.driver.lock();
        if driver.is_none() {
            tracing::info!(tick = ?self.shared.config.tick, "starting job queue");
            *driver = Some(tokio::spawn(drive(Arc::clone(&self.shared))));
        }
        Ok(())
    }

    /// Whether the driver is active and the queue accepts work.
    pub fn is_running(&self) -> bool {
        !self.shared.shutdown.is_cancelled() && self.shared.driver.lock().is_some()
    }

    /// Append a job to the waiting list. Dropped silently once shutdown began.
    pub async fn submit(&self, job: Arc<Job<T>>, kind: JobKind, callbacks: JobCallbacks<T>) {
        let mut state = self.shared.state.lock().await;
        if state.shutting_down {
            tracing::debug!(uuid = %job.uuid(), %kind, "queue shutting down, dropping job");
            return;
        }
        tracing::info!(uuid = %job.uuid(), %kind, waiting = state.waiting.len(), "job queued");
        state.waiting.push_back(QueueEntry {
            job,
            kind,
            callbacks,
        });
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Stop the driver, discard waiting jobs and stop the running one.
    ///
    /// The stopped job is neither moved to history nor reported through
    /// `on_finish`. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shared.state.lock().await.shutting_down = true;
        self.shared.shutdown.cancel();

        let driver = self.shared.driver.lock().take();
        match driver {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "job queue driver failed");
                }
            }
            None => drain(&self.shared).await,
        }
    }

    pub async fn waiting(&self) -> Vec<QueueEntry<T>> {
        self.shared.state.lock().await.waiting.iter().cloned().collect()
    }

    pub async fn running(&self) -> Option<QueueEntry<T>> {
        self.shared.state.lock().await.running.clone()
    }

    /// Finished entries, oldest first.
    pub async fn finished(&self) -> Vec<QueueEntry<T>> {
        self.shared.state.lock().await.finished.iter().cloned().collect()
    }

    /// Look up a job by uuid among waiting, running and finished entries.
    pub async fn job(&self, uuid: Uuid) -> Option<Arc<Job<T>>> {
        let state = self.shared.state.lock().await;
        state
            .running
            .iter()
            .chain(state.waiting.iter())
            .chain(state.finished.iter())
            .find(|e| e.job.uuid() == uuid)
            .map(|e| Arc::clone(&e.job))
    }

    pub async fn state(&self) -> WorkQueueState {
        let state = self.shared.state.lock().await;
        WorkQueueState {
            waiting: state.waiting.iter().map(QueueEntry::status_item).collect(),
            finished: state.finished.iter().map(QueueEntry::status_item).collect(),
            current: state.running.as_ref().map(QueueEntry::status_item),
        }
    }

    pub async fn status(&self) -> WorkQueueStatus<T::Progress, T::Config> {
        let current = self.running().await.map(|entry| WorkQueueStatusEntry {
            item: entry.status_item(),
            progress: entry.job.progress(),
            config: entry.job.config(),
        });
        WorkQueueStatus {
            is_running: current.is_some(),
            current,
        }
    }
}

async fn drive<T: JobTask>(shared: Arc<Shared<T>>) {
    let mut interval = tokio::time::interval(shared.config.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = interval.tick() => {}
            _ = shared.wake.notified() => {}
        }

        if let Some(entry) = retire_finished(&shared).await {
            entry.callbacks.finished(Arc::clone(&entry.job)).await;
        }
        if let Some(entry) = promote_next(&shared).await {
            entry.callbacks.started(Arc::clone(&entry.job)).await;
        }
    }

    drain(&shared).await;
    tracing::info!("job queue stopped");
}

/// Move the running entry to history once its job is done.
async fn retire_finished<T: JobTask>(shared: &Arc<Shared<T>>) -> Option<QueueEntry<T>> {
    let task = {
        let mut state = shared.state.lock().await;
        let done = state.running.as_ref().is_some_and(|e| e.job.is_done());
        if !done {
            return None;
        }
        state.running_task.take()
    };

    if let Some(task) = task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "job task did not complete cleanly");
        }
    }

    let mut state = shared.state.lock().await;
    let entry = state.running.take()?;
    tracing::info!(
        uuid = %entry.job.uuid(),
        kind = %entry.kind,
        error = entry.job.error().as_deref(),
        duration = entry.job.duration(),
        "job finished"
    );
    state.finished.push_back(entry.clone());
    while state.finished.len() > shared.config.finished_capacity {
        state.finished.pop_front();
    }
    drop(state);
    shared.wake.notify_one();
    Some(entry)
}

/// Start the oldest waiting entry if nothing is running.
async fn promote_next<T: JobTask>(shared: &Arc<Shared<T>>) -> Option<QueueEntry<T>> {
    let mut state = shared.state.lock().await;
    if state.running.is_some() || state.shutting_down {
        return None;
    }
    let entry = state.waiting.pop_front()?;
    tracing::info!(uuid = %entry.job.uuid(), kind = %entry.kind, "job starting");

    let job = Arc::clone(&entry.job);
    let notify = Arc::clone(shared);
    state.running_task = Some(tokio::spawn(async move {
        job.run().await;
        notify.wake.notify_one();
    }));
    state.running = Some(entry.clone());
    Some(entry)
}

/// Clear waiting jobs and stop the running one.
async fn drain<T: JobTask>(shared: &Arc<Shared<T>>) {
    let (running, task) = {
        let mut state = shared.state.lock().await;
        state.shutting_down = true;
        if !state.waiting.is_empty() {
            tracing::info!(count = state.waiting.len(), "discarding waiting jobs");
            state.waiting.clear();
        }
        (state.running.take(), state.running_task.take())
    };

    if let Some(entry) = running {
        entry.job.stop().await;
    }
    if let Some(task) = task {
        task.abort();
        let _ = task.await;
    }
}

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use testbed_job_queue::{
    async_trait, Job, JobCallbacks, JobError, JobKind, JobQueue, JobTask, QueueConfig,
};
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Copy)]
enum Behavior {
    Sleep(Duration),
    Fail(&'static str),
    Block,
}

#[derive(Default)]
struct Tracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: Mutex<Vec<Uuid>>,
    finished: Mutex<Vec<Uuid>>,
    finished_at: Mutex<Vec<Instant>>,
}

struct ScriptedTask {
    behavior: Behavior,
    tracker: Arc<Tracker>,
    cancelled: AtomicBool,
    release: Notify,
}

#[async_trait]
impl JobTask for ScriptedTask {
    type Config = &'static str;
    type Progress = bool;
    type Results = ();

    async fn execute(&self) -> Result<(), JobError> {
        let now = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_active.fetch_max(now, Ordering::SeqCst);
        let result = match self.behavior {
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Behavior::Fail(msg) => Err(JobError::failed(msg)),
            Behavior::Block => {
                self.release.notified().await;
                Err(JobError::Cancelled)
            }
        };
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.release.notify_one();
    }

    fn config(&self) -> &'static str {
        "scripted"
    }

    fn progress(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn results(&self) {}
}

fn job(behavior: Behavior, tracker: &Arc<Tracker>) -> Arc<Job<ScriptedTask>> {
    Arc::new(Job::new(ScriptedTask {
        behavior,
        tracker: Arc::clone(tracker),
        cancelled: AtomicBool::new(false),
        release: Notify::new(),
    }))
}

fn callbacks(tracker: &Arc<Tracker>) -> JobCallbacks<ScriptedTask> {
    let on_start = Arc::clone(tracker);
    let on_finish = Arc::clone(tracker);
    JobCallbacks::new(
        move |job: Arc<Job<ScriptedTask>>| {
            let tracker = Arc::clone(&on_start);
            async move { tracker.started.lock().push(job.uuid()) }
        },
        move |job: Arc<Job<ScriptedTask>>| {
            let tracker = Arc::clone(&on_finish);
            async move {
                tracker.finished.lock().push(job.uuid());
                tracker.finished_at.lock().push(Instant::now());
            }
        },
    )
}

fn queue(capacity: usize) -> JobQueue<ScriptedTask> {
    let queue = JobQueue::new(
        QueueConfig::default()
            .with_tick(TICK)
            .with_finished_capacity(capacity),
    );
    queue.start().unwrap();
    queue
}

#[tokio::test(start_paused = true)]
async fn jobs_start_and_finish_in_submission_order() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);

    let mut ids = Vec::new();
    for _ in 0..5 {
        let j = job(Behavior::Sleep(Duration::from_millis(500)), &tracker);
        ids.push(j.uuid());
        queue.submit(j, JobKind::Benchmark, callbacks(&tracker)).await;
    }

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(*tracker.started.lock(), ids);
    assert_eq!(*tracker.finished.lock(), ids);
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);

    let finished: Vec<Uuid> = queue.finished().await.iter().map(|e| e.job().uuid()).collect();
    assert_eq!(finished, ids);
    assert!(queue.running().await.is_none());
    assert!(queue.waiting().await.is_empty());

    queue.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failing_job_finishes_within_one_tick() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);

    let j = job(Behavior::Fail("tool not found"), &tracker);
    let submitted = Instant::now();
    queue
        .submit(Arc::clone(&j), JobKind::Compliance, callbacks(&tracker))
        .await;

    tokio::time::sleep(TICK * 5).await;

    assert_eq!(tracker.finished.lock().len(), 1);
    assert!(tracker.finished_at.lock()[0] - submitted <= TICK);

    let outcome = j.results();
    assert!(j.is_done());
    assert!(outcome.is_error);
    assert_eq!(outcome.error.as_deref(), Some("tool not found"));

    let finished = queue.finished().await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].kind(), JobKind::Compliance);

    queue.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn queue_survives_failures_and_keeps_going() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);

    let bad = job(Behavior::Fail("broken"), &tracker);
    let good = job(Behavior::Sleep(Duration::from_millis(100)), &tracker);
    queue.submit(Arc::clone(&bad), JobKind::Benchmark, callbacks(&tracker)).await;
    queue.submit(Arc::clone(&good), JobKind::Benchmark, callbacks(&tracker)).await;

    tokio::time::sleep(TICK * 5).await;

    assert_eq!(*tracker.finished.lock(), vec![bad.uuid(), good.uuid()]);
    assert!(bad.results().is_error);
    assert!(!good.results().is_error);

    queue.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_running_and_discards_waiting() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);

    let first = job(Behavior::Sleep(Duration::from_millis(10)), &tracker);
    queue.submit(Arc::clone(&first), JobKind::Benchmark, callbacks(&tracker)).await;
    tokio::time::sleep(TICK * 2).await;

    let blocker = job(Behavior::Block, &tracker);
    queue
        .submit(Arc::clone(&blocker), JobKind::Benchmark, callbacks(&tracker))
        .await;
    let mut waiting = Vec::new();
    for _ in 0..3 {
        let j = job(Behavior::Sleep(Duration::from_millis(10)), &tracker);
        waiting.push(Arc::clone(&j));
        queue.submit(j, JobKind::Benchmark, callbacks(&tracker)).await;
    }
    tokio::time::sleep(TICK).await;

    assert_eq!(
        queue.running().await.map(|e| e.job().uuid()),
        Some(blocker.uuid())
    );
    assert_eq!(queue.waiting().await.len(), 3);

    queue.shutdown().await;

    assert!(blocker.task().cancelled.load(Ordering::SeqCst));
    assert!(blocker.is_done());
    assert!(blocker.time_end().is_some());
    for j in &waiting {
        assert!(j.time_start().is_none());
    }
    assert_eq!(*tracker.started.lock(), vec![first.uuid(), blocker.uuid()]);
    assert_eq!(*tracker.finished.lock(), vec![first.uuid()]);

    let finished: Vec<Uuid> = queue.finished().await.iter().map(|e| e.job().uuid()).collect();
    assert_eq!(finished, vec![first.uuid()]);
    assert!(queue.waiting().await.is_empty());
    assert!(queue.running().await.is_none());
    assert!(!queue.is_running());
}

#[tokio::test(start_paused = true)]
async fn submit_after_shutdown_is_dropped() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);
    queue.shutdown().await;

    let j = job(Behavior::Sleep(Duration::from_millis(10)), &tracker);
    queue.submit(Arc::clone(&j), JobKind::Benchmark, callbacks(&tracker)).await;
    tokio::time::sleep(TICK * 3).await;

    assert!(queue.waiting().await.is_empty());
    assert!(tracker.started.lock().is_empty());
    assert!(j.time_start().is_none());
    assert!(queue.start().is_err());

    queue.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn finished_history_is_bounded() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(2);

    let mut ids = Vec::new();
    for _ in 0..4 {
        let j = job(Behavior::Sleep(Duration::from_millis(10)), &tracker);
        ids.push(j.uuid());
        queue.submit(j, JobKind::Benchmark, callbacks(&tracker)).await;
    }
    tokio::time::sleep(TICK * 10).await;

    let finished: Vec<Uuid> = queue.finished().await.iter().map(|e| e.job().uuid()).collect();
    assert_eq!(finished, ids[2..].to_vec());
    assert_eq!(tracker.finished.lock().len(), 4);

    queue.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn state_and_status_describe_the_queue() {
    let tracker = Arc::new(Tracker::default());
    let queue = queue(100);

    let blocker = job(Behavior::Block, &tracker);
    let next = job(Behavior::Sleep(Duration::from_millis(10)), &tracker);
    queue.submit(Arc::clone(&blocker), JobKind::Compliance, callbacks(&tracker)).await;
    queue.submit(Arc::clone(&next), JobKind::Benchmark, callbacks(&tracker)).await;
    tokio::time::sleep(TICK).await;

    let state = queue.state().await;
    let current = state.current.expect("current job");
    assert_eq!(current.uuid, blocker.uuid());
    assert_eq!(current.kind, JobKind::Compliance);
    assert!(current.is_running);
    assert_eq!(state.waiting.len(), 1);
    assert_eq!(state.waiting[0].uuid, next.uuid());
    assert!(state.finished.is_empty());

    let status = queue.status().await;
    assert!(status.is_running);
    let entry = status.current.expect("status entry");
    assert_eq!(entry.config, "scripted");
    assert_eq!(entry.progress.uuid, blocker.uuid());
    assert!(!entry.progress.progress);

    assert_eq!(queue.job(next.uuid()).await.map(|j| j.uuid()), Some(next.uuid()));
    assert!(queue.job(Uuid::new_v4()).await.is_none());

    queue.shutdown().await;
    assert!(!queue.status().await.is_running);
}

//! Lifecycle hooks invoked by the queue driver.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::job::{Job, JobTask};

type Hook<T> = Arc<dyn Fn(Arc<Job<T>>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A pair of asynchronous hooks supplied with each submitted job.
///
/// `on_start` runs once the job has been promoted and started; `on_finish`
/// runs exactly once after it reaches `Done`. Neither is invoked while the
/// queue holds its internal lock.
pub struct JobCallbacks<T: JobTask> {
    on_start: Hook<T>,
    on_finish: Hook<T>,
}

impl<T: JobTask> Clone for JobCallbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_start: Arc::clone(&self.on_start),
            on_finish: Arc::clone(&self.on_finish),
        }
    }
}

impl<T: JobTask> JobCallbacks<T> {
    pub fn new<S, SF, F, FF>(on_start: S, on_finish: F) -> Self
    where
        S: Fn(Arc<Job<T>>) -> SF + Send + Sync + 'static,
        SF: Future<Output = ()> + Send + 'static,
        F: Fn(Arc<Job<T>>) -> FF + Send + Sync + 'static,
        FF: Future<Output = ()> + Send + 'static,
    {
        Self {
            on_start: Arc::new(move |job: Arc<Job<T>>| on_start(job).boxed()),
            on_finish: Arc::new(move |job: Arc<Job<T>>| on_finish(job).boxed()),
        }
    }

    /// Callbacks that do nothing.
    pub fn noop() -> Self {
        Self::new(|_| async {}, |_| async {})
    }

    pub(crate) async fn started(&self, job: Arc<Job<T>>) {
        (self.on_start)(job).await
    }

    pub(crate) async fn finished(&self, job: Arc<Job<T>>) {
        (self.on_finish)(job).await
    }
}

impl<T: JobTask> Default for JobCallbacks<T> {
    fn default() -> Self {
        Self::noop()
    }
}

//! Run blocking repository calls off the caller's thread.
//!
//! A [`BackgroundRepository`] owns one long-lived worker thread. Calls are
//! queued on a bounded channel and executed in order; each result comes back
//! over a oneshot channel. A full queue makes callers wait asynchronously
//! instead of spawning more threads. The futures do not depend on a
//! particular async runtime.

use crate::error::{StoreError, StoreResult};
use crate::model::UserRecord;
use crate::repository::UserRepository;
use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};
use futures::lock::Mutex;
use futures::SinkExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Default number of calls that may wait for the worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

type Job<R> = Box<dyn FnOnce(&R) + Send + 'static>;

/// Async face of [`UserRepository`]
#[async_trait]
pub trait AsyncUserRepository: Send + Sync {
    async fn insert(&self, record: UserRecord) -> StoreResult<i64>;

    async fn get_all_users(&self) -> StoreResult<Vec<UserRecord>>;
}

pub struct BackgroundRepository<R> {
    repo: Arc<R>,
    // One shared sender: each clone of an `mpsc::Sender` adds its own slot,
    // which would let the queue grow past `capacity`.
    jobs: Arc<Mutex<mpsc::Sender<Job<R>>>>,
}

impl<R> BackgroundRepository<R>
where
    R: UserRepository + Send + Sync + 'static,
{
    pub fn new(repo: R) -> StoreResult<Self> {
        Self::with_capacity(repo, DEFAULT_QUEUE_CAPACITY)
    }

    /// Start the worker with room for `capacity` queued calls.
    ///
    /// The worker exits once every clone of the returned value is dropped.
    pub fn with_capacity(repo: R, capacity: usize) -> StoreResult<Self> {
        let repo = Arc::new(repo);
        let (jobs, receiver) = mpsc::channel(capacity);
        spawn_worker(Arc::clone(&repo), receiver)?;
        Ok(Self {
            repo,
            jobs: Arc::new(Mutex::new(jobs)),
        })
    }

    /// The wrapped blocking repository
    pub fn inner(&self) -> &R {
        &self.repo
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> StoreResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<R> = Box::new(move |repo: &R| {
            // The caller may have dropped the future; nobody is left to tell.
            let _ = tx.send(op(repo));
        });

        self.jobs
            .lock()
            .await
            .send(job)
            .await
            .map_err(|_| StoreError::TaskAborted)?;
        rx.await.map_err(|_| StoreError::TaskAborted)?
    }
}

fn spawn_worker<R>(repo: Arc<R>, receiver: mpsc::Receiver<Job<R>>) -> StoreResult<()>
where
    R: Send + Sync + 'static,
{
    thread::Builder::new()
        .name("user-store-worker".to_string())
        .spawn(move || worker_loop::<R>(&repo, receiver))
        .map_err(StoreError::WorkerSpawn)?;
    Ok(())
}

// A panicking job drops its reply sender, so its caller sees `TaskAborted`
// while the worker keeps serving the queue.
fn worker_loop<R>(repo: &R, receiver: mpsc::Receiver<Job<R>>) {
    for job in futures::executor::block_on_stream(receiver) {
        if panic::catch_unwind(AssertUnwindSafe(|| job(repo))).is_err() {
            tracing::error!("store worker job panicked");
        }
    }
    tracing::debug!("store worker stopped");
}

impl<R> Clone for BackgroundRepository<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            jobs: Arc::clone(&self.jobs),
        }
    }
}

#[async_trait]
impl<R> AsyncUserRepository for BackgroundRepository<R>
where
    R: UserRepository + Send + Sync + 'static,
{
    async fn insert(&self, record: UserRecord) -> StoreResult<i64> {
        self.run(move |repo| repo.insert(&record)).await
    }

    async fn get_all_users(&self) -> StoreResult<Vec<UserRecord>> {
        self.run(|repo| repo.get_all_users()).await
    }
}

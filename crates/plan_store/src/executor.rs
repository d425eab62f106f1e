//! Per-instance serializing executor.
//!
//! One tokio task owns the instance's queue and runs submitted work strictly
//! one unit at a time in submission order. A failed unit only fails its own
//! submitter; the worker moves on to the next one.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, error, warn};
use sea_orm::DatabaseConnection;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use plan_core::{DatabaseState, PlanError, PlanResult};

use crate::transaction::Criticality;

type Job = Box<dyn FnOnce(DatabaseConnection) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct Task {
    label: String,
    criticality: Criticality,
    job: Job,
}

/// Submission side of an executor. Cheap to clone.
#[derive(Clone)]
pub(crate) struct ExecutorClient {
    sender: mpsc::UnboundedSender<Task>,
    pending: Arc<AtomicUsize>,
}

impl ExecutorClient {
    /// Queues `work` and waits for it to finish.
    ///
    /// Work dropped at shutdown surfaces as [`PlanError::Discarded`].
    pub(crate) async fn submit<T, F, Fut>(
        &self,
        label: impl Into<String>,
        criticality: Criticality,
        work: F,
    ) -> PlanResult<T>
    where
        T: Send + 'static,
        F: FnOnce(DatabaseConnection) -> Fut + Send + 'static,
        Fut: Future<Output = PlanResult<T>> + Send + 'static,
    {
        let label = label.into();
        let (reply, outcome) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            Box::pin(async move {
                let result = work(conn).await;
                let _ = reply.send(result);
            })
        });
        self.pending.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            label: label.clone(),
            criticality,
            job,
        };
        if self.sender.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PlanError::not_open(DatabaseState::Closed));
        }
        outcome
            .await
            .map_err(|_| PlanError::discarded(label))?
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

pub(crate) struct Executor {
    client: ExecutorClient,
    deadline: Arc<OnceLock<Instant>>,
    worker: JoinHandle<()>,
}

impl Executor {
    pub(crate) fn start(name: String, conn: DatabaseConnection) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let deadline = Arc::new(OnceLock::new());
        let worker = tokio::spawn(run_worker(
            name,
            conn,
            receiver,
            Arc::clone(&pending),
            Arc::clone(&deadline),
        ));
        Self {
            client: ExecutorClient { sender, pending },
            deadline,
            worker,
        }
    }

    pub(crate) fn client(&self) -> ExecutorClient {
        self.client.clone()
    }

    /// Stops accepting work and waits for the queue to drain.
    ///
    /// Critical work always runs; non-critical work still queued after
    /// `grace` has elapsed is dropped.
    pub(crate) async fn shutdown(self, grace: Duration) {
        let _ = self.deadline.set(Instant::now() + grace);
        drop(self.client);
        if let Err(err) = self.worker.await {
            error!("executor worker ended abnormally: {err}");
        }
    }
}

async fn run_worker(
    name: String,
    conn: DatabaseConnection,
    mut receiver: mpsc::UnboundedReceiver<Task>,
    pending: Arc<AtomicUsize>,
    deadline: Arc<OnceLock<Instant>>,
) {
    debug!("executor for {name} started");
    while let Some(task) = receiver.recv().await {
        pending.fetch_sub(1, Ordering::SeqCst);
        let past_grace = deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline);
        if past_grace && task.criticality == Criticality::NonCritical {
            warn!(
                "{name}: discarding non-critical '{}' queued past the shutdown grace period",
                task.label
            );
            continue;
        }
        debug!("{name}: running '{}'", task.label);
        let unit = (task.job)(conn.clone());
        if let Err(err) = tokio::spawn(unit).await {
            error!("{name}: '{}' panicked: {err}", task.label);
        }
    }
    debug!("executor for {name} drained");
}

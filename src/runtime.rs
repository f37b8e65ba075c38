//! Runtime for handling chat updates
//!
//! Updates from one user are handled strictly in arrival order by a
//! per-user queue task; different users proceed concurrently. A queue
//! that stays empty for the idle period is torn down and recreated on the
//! next update.

pub mod identity;
pub mod outbox;
pub mod router;
pub mod state_manager;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::state_machine::{Update, UserId};
use router::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("user queue closed before the update was handled")]
    Closed,
    /// The turn panicked; its state changes up to that point stand
    #[error("turn for user {0} aborted")]
    TurnAborted(UserId),
}

struct Job {
    update: Update,
    done: Option<oneshot::Sender<Result<(), DispatchError>>>,
}

/// Handle to a running per-user queue
struct QueueHandle {
    generation: u64,
    tx: mpsc::UnboundedSender<Job>,
}

/// Serializes turns per user
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    queues: Arc<RwLock<HashMap<UserId, QueueHandle>>>,
    next_generation: Arc<AtomicU64>,
    idle: Duration,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, idle: Duration) -> Self {
        Self {
            router,
            queues: Arc::new(RwLock::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            idle,
        }
    }

    /// Queue an update without waiting for its turn to run
    pub async fn dispatch(&self, update: Update) {
        self.enqueue(update, None).await;
    }

    /// Queue an update and wait until its turn has completed
    pub async fn dispatch_and_wait(&self, update: Update) -> Result<(), DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(update, Some(tx)).await;
        rx.await.map_err(|_| DispatchError::Closed)?
    }

    /// Number of users with a live queue
    pub async fn active_users(&self) -> usize {
        self.queues.read().await.len()
    }

    async fn enqueue(&self, update: Update, done: Option<oneshot::Sender<Result<(), DispatchError>>>) {
        let Some(user_id) = update.user_id() else {
            tracing::debug!(update_id = update.update_id, "Ignoring update without a sender");
            if let Some(done) = done {
                let _ = done.send(Ok(()));
            }
            return;
        };
        let mut job = Job { update, done };

        // Fast path: queue already running
        {
            let queues = self.queues.read().await;
            if let Some(handle) = queues.get(&user_id) {
                match handle.tx.send(job) {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(returned)) => job = returned,
                }
            }
        }

        let mut queues = self.queues.write().await;
        if let Some(handle) = queues.get(&user_id) {
            match handle.tx.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        queues.insert(user_id, QueueHandle { generation, tx });
        drop(queues);

        tracing::debug!(user_id, generation, "Starting user queue");
        tokio::spawn(self.clone().run_queue(user_id, generation, job, rx));
    }

    async fn run_queue(self, user_id: UserId, generation: u64, first: Job, mut rx: mpsc::UnboundedReceiver<Job>) {
        self.run_turn(user_id, first).await;
        loop {
            let job = match tokio::time::timeout(self.idle, rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => {
                    // Senders only enqueue under the read lock, so an empty
                    // queue seen under the write lock stays empty
                    let mut queues = self.queues.write().await;
                    if let Ok(job) = rx.try_recv() {
                        job
                    } else {
                        if queues.get(&user_id).is_some_and(|h| h.generation == generation) {
                            queues.remove(&user_id);
                        }
                        break;
                    }
                }
            };
            self.run_turn(user_id, job).await;
        }
        tracing::debug!(user_id, generation, "User queue stopped");
    }

    async fn run_turn(&self, user_id: UserId, job: Job) {
        let Job { update, done } = job;
        let span = tracing::info_span!(
            "turn",
            turn_id = %uuid::Uuid::new_v4(),
            user_id,
            update_id = update.update_id
        );
        let router = Arc::clone(&self.router);

        // A panicking turn must not take the user's queue down with it
        let handle = tokio::spawn(async move { router.handle(update).await }.instrument(span.clone()));
        let result = match handle.await {
            Ok(()) => Ok(()),
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "Turn aborted"));
                Err(DispatchError::TurnAborted(user_id))
            }
        };
        if let Some(done) = done {
            let _ = done.send(result);
        }
    }
}

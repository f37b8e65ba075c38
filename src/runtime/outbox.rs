//! Background delivery of notifications to other users
//!
//! Turns never wait on fan-out: notification effects are queued here and a
//! worker delivers them with bounded concurrency, retrying transient
//! transport failures.

use super::traits::Transport;
use crate::state_machine::{MediaKind, Notification};
use crate::telegram::TransportError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Attempts per notification, including the first
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Deliveries in flight at once
const MAX_CONCURRENT_DELIVERIES: u32 = 8;

pub type OutboxReceiver = mpsc::UnboundedReceiver<Notification>;

/// Sending half handed to the router
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Notification>,
}

pub fn channel() -> (Outbox, OutboxReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, rx)
}

impl Outbox {
    /// Queue a notification; returns false once the worker has stopped
    pub fn enqueue(&self, notification: Notification) -> bool {
        let chat_id = notification.chat_id;
        if self.tx.send(notification).is_err() {
            tracing::warn!(chat_id, "Outbox closed, notification dropped");
            return false;
        }
        true
    }
}

pub struct OutboxWorker {
    transport: Arc<dyn Transport>,
    rx: OutboxReceiver,
    permits: Arc<Semaphore>,
    base_delay: Duration,
}

impl OutboxWorker {
    pub fn new(transport: Arc<dyn Transport>, rx: OutboxReceiver) -> Self {
        Self {
            transport,
            rx,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES as usize)),
            base_delay: Duration::from_secs(1),
        }
    }

    /// First backoff step; later retries double it
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Drain the queue until cancelled or every sender is gone
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Outbox worker started");
        loop {
            let notification = tokio::select! {
                () = cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(notification) => notification,
                    None => break,
                },
            };
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            let transport = Arc::clone(&self.transport);
            let base_delay = self.base_delay;
            tokio::spawn(async move {
                let chat_id = notification.chat_id;
                match deliver(transport.as_ref(), &notification, base_delay).await {
                    Ok(attempts) => tracing::debug!(chat_id, attempts, "Notification delivered"),
                    Err(e) => tracing::warn!(chat_id, error = %e, kind = ?e.kind, "Notification dropped"),
                }
                drop(permit);
            });
        }

        // Let in-flight deliveries finish
        let _ = self.permits.acquire_many(MAX_CONCURRENT_DELIVERIES).await;
        tracing::info!("Outbox worker stopped");
    }
}

async fn send_once(transport: &dyn Transport, notification: &Notification) -> Result<(), TransportError> {
    let chat_id = notification.chat_id;
    match &notification.attachment {
        Some(file) => {
            let caption = Some(notification.text.as_str()).filter(|t| !t.is_empty());
            match file.kind {
                MediaKind::Photo => transport.send_photo(chat_id, file, caption).await?,
                MediaKind::Document => transport.send_document(chat_id, file, caption).await?,
            };
            Ok(())
        }
        None => {
            transport
                .send_message(chat_id, &notification.text, notification.keyboard.as_ref())
                .await
        }
    }
}

/// Deliver with retries; returns the number of attempts used
async fn deliver(
    transport: &dyn Transport,
    notification: &Notification,
    base_delay: Duration,
) -> Result<u32, TransportError> {
    let mut attempt = 1;
    loop {
        match send_once(transport, notification).await {
            Ok(()) => return Ok(attempt),
            Err(e) if e.is_retryable() && attempt < MAX_DELIVERY_ATTEMPTS => {
                let delay = e.retry_after.unwrap_or_else(|| retry_delay(base_delay, attempt));
                tracing::warn!(
                    chat_id = notification.chat_id,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff (base, 2x base, 4x base) plus up to 25% jitter
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let backoff = base * 2u32.pow(attempt.saturating_sub(1));
    let spread = u64::try_from(backoff.as_millis() / 4).unwrap_or(0);
    let jitter = rand::thread_rng().gen_range(0..=spread);
    backoff + Duration::from_millis(jitter)
}

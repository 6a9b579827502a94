//! Durable FIFO retry queue and its background sweep.
//!
//! Failed dispatches land here; a periodic worker pops one entry per tick
//! and pushes it back through the dispatcher. An entry survives up to
//! [`MAX_RETRY_ATTEMPTS`] dispatch attempts before it is dropped and the
//! bill flagged as permanently failed.

use crate::error::AppError;
use crate::models::RetryEntry;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::metrics;
use crate::services::storage::{Storage, RETRY_QUEUE_KEY};
use crate::services::store::BillStore;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const MAX_RETRY_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct RetryQueue {
    storage: Storage,
    inner: Arc<Mutex<VecDeque<RetryEntry>>>,
}

impl RetryQueue {
    pub async fn load(storage: Storage) -> Result<Self, AppError> {
        let entries = storage.load_retry_entries().await?;
        if !entries.is_empty() {
            tracing::info!(pending = entries.len(), "retry queue hydrated");
        }
        Ok(Self {
            storage,
            inner: Arc::new(Mutex::new(entries.into())),
        })
    }

    async fn persist(&self, queue: &VecDeque<RetryEntry>) -> Result<(), AppError> {
        let entries: Vec<RetryEntry> = queue.iter().cloned().collect();
        self.storage.save_retry_entries(&entries).await
    }

    /// Enqueue a freshly failed dispatch.
    pub async fn push(&self, entry: RetryEntry) -> Result<(), AppError> {
        let mut queue = self.inner.lock().await;
        tracing::info!(
            bill_id = entry.bill_id,
            attempts = entry.attempts,
            "queued notification for retry"
        );
        queue.push_back(entry);
        self.persist(&queue).await?;
        metrics::RETRIES_ENQUEUED_TOTAL.inc();
        Ok(())
    }

    /// Put a failed redrive back at the end of the line.
    pub async fn requeue(&self, entry: RetryEntry) -> Result<(), AppError> {
        let mut queue = self.inner.lock().await;
        tracing::info!(
            bill_id = entry.bill_id,
            attempts = entry.attempts,
            "requeued notification for another attempt"
        );
        queue.push_back(entry);
        self.persist(&queue).await?;
        metrics::RETRIES_REQUEUED_TOTAL.inc();
        Ok(())
    }

    /// Pop the oldest entry. The removal is persisted immediately.
    pub async fn pop(&self) -> Result<Option<RetryEntry>, AppError> {
        let mut queue = self.inner.lock().await;
        let entry = queue.pop_front();
        if entry.is_some() {
            self.persist(&queue).await?;
        }
        Ok(entry)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn entries(&self) -> Vec<RetryEntry> {
        self.inner.lock().await.iter().cloned().collect()
    }

    /// Empty the queue through the normal save path.
    pub async fn clear(&self) -> Result<(), AppError> {
        let mut queue = self.inner.lock().await;
        queue.clear();
        self.persist(&queue).await
    }

    /// Hard reset: empty the queue and remove its durable key outright.
    pub async fn reset(&self) -> Result<(), AppError> {
        let mut queue = self.inner.lock().await;
        queue.clear();
        self.storage.remove_key(RETRY_QUEUE_KEY).await
    }
}

/// One sweep of the queue. Processes at most one entry and reports whether
/// anything was there to process.
pub async fn retry_tick(
    dispatcher: &NotificationDispatcher,
    queue: &RetryQueue,
    store: &BillStore,
) -> Result<bool, AppError> {
    let Some(entry) = queue.pop().await? else {
        return Ok(false);
    };

    tracing::info!(
        bill_id = entry.bill_id,
        attempt = entry.attempts + 1,
        "retrying notification delivery"
    );

    match dispatcher.redrive(entry.bill_id, &entry.phone).await {
        Ok(result) => {
            tracing::info!(
                bill_id = entry.bill_id,
                method = %result.method,
                "retry succeeded"
            );
            Ok(true)
        }
        // The bill is gone; there is nothing left to deliver.
        Err(AppError::NotFound(e)) => {
            tracing::warn!(bill_id = entry.bill_id, error = %e, "dropping retry for missing bill");
            metrics::RETRIES_DROPPED_TOTAL.inc();
            Ok(true)
        }
        Err(e) => {
            if entry.attempts < MAX_RETRY_ATTEMPTS {
                queue.requeue(entry.next_attempt(e.to_string())).await?;
            } else {
                tracing::error!(
                    bill_id = entry.bill_id,
                    attempts = entry.attempts,
                    error = %e,
                    "notification permanently failed, dropping retry entry"
                );
                metrics::RETRIES_DROPPED_TOTAL.inc();
                if let Err(mark_err) = store.record_notification_failed(entry.bill_id).await {
                    tracing::warn!(bill_id = entry.bill_id, error = %mark_err, "could not flag bill as failed");
                }
            }
            Ok(true)
        }
    }
}

/// Background sweep loop. Runs until the token is cancelled; a tick that
/// fails is logged and the loop keeps going.
pub async fn run_retry_worker(
    dispatcher: NotificationDispatcher,
    queue: RetryQueue,
    store: BillStore,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!(interval_ms = poll_interval.as_millis() as u64, "retry worker started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("retry worker stopping");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {
                if let Err(e) = retry_tick(&dispatcher, &queue, &store).await {
                    tracing::error!(error = %e, "retry sweep failed");
                }
            }
        }
    }
}

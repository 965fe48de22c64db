//! Periodic drain of the ingestion buffer into storage.
//!
//! A single worker owns the flush loop, so a slow flush delays the next
//! tick instead of overlapping with it.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::buffer::ConditionBuffer;
use crate::db::ConditionStore;

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Buffer was empty, storage untouched
    Idle,
    /// Every drained record was committed
    Persisted(usize),
    /// The batch insert failed and the drained records were discarded
    Dropped(usize),
}

/// Drain the buffer and persist it as one batch
///
/// Drained records are not re-enqueued when the insert fails.
pub async fn flush_once(buffer: &ConditionBuffer, store: &ConditionStore) -> FlushOutcome {
    let batch = buffer.drain();
    if batch.is_empty() {
        return FlushOutcome::Idle;
    }

    match store.insert_conditions(&batch).await {
        Ok(_) => {
            debug!("Flushed {} condition(s)", batch.len());
            FlushOutcome::Persisted(batch.len())
        }
        Err(e) => {
            error!(
                "db error: failed to flush {} condition(s), batch dropped: {}",
                batch.len(),
                e
            );
            FlushOutcome::Dropped(batch.len())
        }
    }
}

/// Spawn the flush worker
///
/// Runs until `shutdown` is cancelled, then flushes whatever is still queued.
pub fn spawn_flush_task(
    buffer: Arc<ConditionBuffer>,
    store: ConditionStore,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    flush_once(&buffer, &store).await;
                }
            }
        }

        match flush_once(&buffer, &store).await {
            FlushOutcome::Persisted(n) => info!("Final flush persisted {} condition(s)", n),
            FlushOutcome::Dropped(n) => error!("Final flush lost {} condition(s)", n),
            FlushOutcome::Idle => {}
        }
        info!("Flush worker stopped");
    })
}

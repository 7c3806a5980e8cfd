//! # Queue Drain
//!
//! One drain cycle: snapshot the session's queue, send each operation in
//! creation order, then report acks, id assignments and failures back.
//!
//! Sending never borrows the session, so a host can keep editing while a
//! batch is in flight:
//!
//! ```rust,ignore
//! let batch = session.take_batch();
//! let outcomes = driver.send_batch(&batch).await;   // edits may happen here
//! driver.apply_outcomes(&mut session, outcomes);
//! ```

use serde::Serialize;
use storyloom_editor::{ClosedChapter, EditSession, OperationId, QueuedOperation};
use tracing::{debug, instrument, warn};

use crate::error::TransportResult;
use crate::store::{RemoteStore, StoreRequest, StoreResponse};

/// Result of sending one operation
#[derive(Debug)]
pub struct SendOutcome {
    pub id: OperationId,
    pub result: TransportResult<StoreResponse>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub sent: usize,
    pub acked: usize,
    pub failed: usize,
    pub assigned: usize,
}

#[derive(Debug)]
pub struct SyncDriver<S> {
    store: S,
}

impl<S: RemoteStore> SyncDriver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Send a snapshot batch in order; every operation is attempted
    #[instrument(skip_all, fields(operations = batch.len()))]
    pub async fn send_batch(&self, batch: &[QueuedOperation]) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for queued in batch {
            let request = StoreRequest::from_operation(&queued.operation);
            let result = self.store.send(&request).await;
            if let Err(e) = &result {
                warn!(id = %queued.id, path = %request.path(), error = %e, "Send failed");
            }
            outcomes.push(SendOutcome {
                id: queued.id,
                result,
            });
        }
        outcomes
    }

    /// Report send results back to the session
    pub fn apply_outcomes(&self, session: &mut EditSession, outcomes: Vec<SendOutcome>) -> DrainReport {
        let mut report = DrainReport {
            sent: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            let applied = match outcome.result {
                Ok(response) => {
                    report.assigned += response.assigned.len();
                    session
                        .acknowledge(outcome.id, &response.assigned)
                        .map(|_| report.acked += 1)
                }
                Err(_) => session.fail(outcome.id).map(|_| report.failed += 1),
            };
            if let Err(e) = applied {
                // the chapter was discarded while the batch was in flight
                warn!(id = %outcome.id, error = %e, "Outcome for unknown operation");
            }
        }

        debug!(sent = report.sent, acked = report.acked, failed = report.failed, "Drain finished");
        report
    }

    /// One full cycle over everything pending
    pub async fn drain(&self, session: &mut EditSession) -> DrainReport {
        let batch = session.take_batch();
        if batch.is_empty() {
            return DrainReport::default();
        }
        let outcomes = self.send_batch(&batch).await;
        self.apply_outcomes(session, outcomes)
    }

    /// Send what a flushed chapter left behind
    pub async fn flush(&self, session: &mut EditSession, closed: ClosedChapter) -> DrainReport {
        if closed.flushed.is_empty() {
            return DrainReport::default();
        }
        let outcomes = self.send_batch(&closed.flushed).await;
        self.apply_outcomes(session, outcomes)
    }
}

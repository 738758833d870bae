use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::ProgressRecord;
use storage::repository::ProgressRepository;
use tokio::sync::{mpsc, watch};

use super::retry::RetryPolicy;

/// Where the durable copy stands relative to the in-memory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncStatus {
    /// No owner; nothing is ever written.
    LocalOnly,
    /// Owned, nothing enqueued since hydration.
    Idle,
    Pending {
        generation: u64,
    },
    Synced {
        generation: u64,
        at: DateTime<Utc>,
    },
    /// Retries exhausted. Local state is kept.
    Failed {
        generation: u64,
        attempts: u32,
        error: String,
    },
}

impl SyncStatus {
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            SyncStatus::LocalOnly | SyncStatus::Idle => 0,
            SyncStatus::Pending { generation }
            | SyncStatus::Synced { generation, .. }
            | SyncStatus::Failed { generation, .. } => *generation,
        }
    }

    /// `true` once a write for `generation` (or a later one) finished.
    #[must_use]
    pub fn settled(&self, generation: u64) -> bool {
        match self {
            SyncStatus::LocalOnly | SyncStatus::Idle => generation == 0,
            SyncStatus::Pending { .. } => false,
            SyncStatus::Synced { generation: done, .. }
            | SyncStatus::Failed { generation: done, .. } => *done >= generation,
        }
    }

    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        matches!(self, SyncStatus::Pending { .. } | SyncStatus::Failed { .. })
    }
}

#[derive(Debug)]
struct Snapshot {
    generation: u64,
    record: ProgressRecord,
}

/// Producer side of one tracker's write queue.
pub(crate) struct SyncHandle {
    queue: mpsc::UnboundedSender<Snapshot>,
    status: Arc<watch::Sender<SyncStatus>>,
    generation: u64,
}

impl SyncHandle {
    /// Start a worker writing to `repo`. Must be called inside a tokio runtime.
    pub(crate) fn spawn(repo: Arc<dyn ProgressRepository>, policy: RetryPolicy) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let status = Arc::new(watch::Sender::new(SyncStatus::Idle));
        tokio::spawn(run_worker(rx, repo, policy, Arc::clone(&status)));
        Self {
            queue,
            status,
            generation: 0,
        }
    }

    /// Queue a full-record write and return its generation.
    pub(crate) fn enqueue(&mut self, record: ProgressRecord) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.status.send_replace(SyncStatus::Pending { generation });
        if self.queue.send(Snapshot { generation, record }).is_err() {
            tracing::error!(generation, "progress sync worker is gone; write dropped");
            self.status.send_replace(SyncStatus::Failed {
                generation,
                attempts: 0,
                error: "sync worker stopped".into(),
            });
        }
        generation
    }

    pub(crate) fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Resolves once the latest enqueued generation has settled.
    pub(crate) fn flush(&self) -> impl Future<Output = SyncStatus> + Send + 'static {
        let target = self.generation;
        let mut rx = self.status.subscribe();
        async move {
            if let Ok(status) = rx.wait_for(|status| status.settled(target)).await {
                return status.clone();
            }
            // Worker gone: report whatever was last published.
            rx.borrow().clone()
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Snapshot>,
    repo: Arc<dyn ProgressRepository>,
    policy: RetryPolicy,
    status: Arc<watch::Sender<SyncStatus>>,
) {
    while let Some(mut snapshot) = rx.recv().await {
        coalesce(&mut rx, &mut snapshot);
        let outcome = write_with_retry(&mut rx, &mut snapshot, repo.as_ref(), policy).await;
        let generation = snapshot.generation;
        // A newer Pending must not be overwritten by an older settlement.
        status.send_if_modified(|current| {
            if current.generation() > generation {
                return false;
            }
            *current = outcome;
            true
        });
    }
    tracing::debug!("progress sync worker stopped");
}

fn coalesce(rx: &mut mpsc::UnboundedReceiver<Snapshot>, snapshot: &mut Snapshot) {
    while let Ok(newer) = rx.try_recv() {
        tracing::debug!(
            skipped = snapshot.generation,
            generation = newer.generation,
            "coalescing progress write"
        );
        *snapshot = newer;
    }
}

async fn write_with_retry(
    rx: &mut mpsc::UnboundedReceiver<Snapshot>,
    snapshot: &mut Snapshot,
    repo: &dyn ProgressRepository,
    policy: RetryPolicy,
) -> SyncStatus {
    let max_attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        let user_id = snapshot.record.user_id;
        match repo.upsert_progress(&snapshot.record).await {
            Ok(()) => {
                tracing::debug!(
                    %user_id,
                    generation = snapshot.generation,
                    attempt,
                    "progress synced"
                );
                return SyncStatus::Synced {
                    generation: snapshot.generation,
                    at: snapshot.record.updated_at,
                };
            }
            Err(err) if attempt >= max_attempts => {
                tracing::error!(
                    %user_id,
                    generation = snapshot.generation,
                    attempts = attempt,
                    error = %err,
                    "progress sync failed; keeping local state"
                );
                return SyncStatus::Failed {
                    generation: snapshot.generation,
                    attempts: attempt,
                    error: err.to_string(),
                };
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    %user_id,
                    generation = snapshot.generation,
                    attempt,
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "progress sync failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                coalesce(rx, snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_tracks_generation() {
        let synced = SyncStatus::Synced {
            generation: 3,
            at: claim_core::time::fixed_now(),
        };
        assert!(synced.settled(3));
        assert!(synced.settled(2));
        assert!(!synced.settled(4));
        assert!(!SyncStatus::Pending { generation: 3 }.settled(3));
        assert!(SyncStatus::Idle.settled(0));
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(SyncStatus::Pending { generation: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending", "generation": 2}));
        let json = serde_json::to_value(SyncStatus::LocalOnly).unwrap();
        assert_eq!(json, serde_json::json!({"state": "localOnly"}));
    }
}

use std::future::Future;
use std::sync::Arc;

use claim_core::model::{Completion, Progress, Stage, TaskId, UserId};
use serde::Serialize;
use storage::ProgressRecord;
use storage::repository::ProgressRepository;
use tokio::sync::watch;

use super::retry::RetryPolicy;
use super::sync::{SyncHandle, SyncStatus};
use crate::Clock;

/// Read-only view of a tracker, as answered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub progress: Progress,
    pub stage_label: &'static str,
    pub sync: SyncStatus,
}

/// One claimant's in-memory progress plus its write-behind queue.
///
/// Mutations apply immediately; persistence happens on a background worker
/// and never rolls local state back.
pub struct ProgressTracker {
    owner: Option<UserId>,
    clock: Clock,
    progress: Progress,
    sync: Option<SyncHandle>,
}

impl ProgressTracker {
    /// Storage-less tracker for anonymous sessions.
    #[must_use]
    pub fn local_only(clock: Clock) -> Self {
        Self {
            owner: None,
            clock,
            progress: Progress::new(),
            sync: None,
        }
    }

    /// Tracker hydrated from `record` (zero state when `None`) that writes back to `repo`.
    ///
    /// Hydration never writes; the row is created by the first mutation.
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn hydrated(
        owner: UserId,
        record: Option<ProgressRecord>,
        clock: Clock,
        repo: Arc<dyn ProgressRepository>,
        policy: RetryPolicy,
    ) -> Self {
        let progress = record.map_or_else(Progress::new, ProgressRecord::into_progress);
        Self {
            owner: Some(owner),
            clock,
            progress,
            sync: Some(SyncHandle::spawn(repo, policy)),
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.progress.stage()
    }

    /// Record a task. Already-completed tasks change nothing and queue no write.
    pub fn complete_task(&mut self, task: TaskId) -> Completion {
        let completion = self.progress.complete(task);
        if let Completion::Recorded { previous, stage } = completion {
            if stage != previous {
                tracing::info!(user_id = ?self.owner, %task, %previous, %stage, "stage advanced");
            }
            self.enqueue();
        }
        completion
    }

    /// Clear all progress; owned trackers persist the cleared state.
    pub fn reset(&mut self) {
        self.progress.reset();
        tracing::info!(user_id = ?self.owner, "progress reset");
        self.enqueue();
    }

    fn enqueue(&mut self) {
        let (Some(owner), Some(sync)) = (self.owner, self.sync.as_mut()) else {
            tracing::debug!("anonymous progress change kept local");
            return;
        };
        let record = ProgressRecord::from_progress(owner, &self.progress, self.clock.now());
        let generation = sync.enqueue(record);
        tracing::debug!(user_id = %owner, generation, "progress write queued");
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.sync
            .as_ref()
            .map_or(SyncStatus::LocalOnly, SyncHandle::status)
    }

    /// Observe sync status changes. Local-only trackers yield a fixed `LocalOnly`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        match &self.sync {
            Some(sync) => sync.subscribe(),
            None => watch::Sender::new(SyncStatus::LocalOnly).subscribe(),
        }
    }

    /// Future resolving once every write queued so far has settled.
    ///
    /// Does not borrow the tracker, so a lock guard can be released before awaiting.
    pub fn flush(&self) -> impl Future<Output = SyncStatus> + Send + 'static {
        let pending = self.sync.as_ref().map(SyncHandle::flush);
        async move {
            match pending {
                Some(pending) => pending.await,
                None => SyncStatus::LocalOnly,
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress.clone(),
            stage_label: self.progress.stage().label(),
            sync: self.sync_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claim_core::model::CompletedTasks;
    use claim_core::time::{fixed_clock, fixed_now};
    use std::sync::Mutex;
    use std::time::Duration;
    use storage::repository::{InMemoryRepository, StorageError};

    /// Fails the first `failures` writes, then delegates.
    struct Flaky {
        failures: Mutex<u32>,
        writes: Mutex<Vec<ProgressRecord>>,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProgressRepository for Flaky {
        async fn get_progress(
            &self,
            _user_id: UserId,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            Ok(None)
        }

        async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StorageError::Connection("store offline".into()));
            }
            self.writes.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: false,
        }
    }

    fn owned(repo: Arc<dyn ProgressRepository>, policy: RetryPolicy) -> ProgressTracker {
        ProgressTracker::hydrated(UserId::new(1), None, fixed_clock(), repo, policy)
    }

    #[tokio::test]
    async fn completion_is_visible_before_write_settles() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut tracker = owned(repo.clone(), quick_policy(1));

        tracker.complete_task(TaskId::ClaimWrite);
        assert_eq!(tracker.stage(), Stage::DamageInfo);
        assert_eq!(tracker.sync_status(), SyncStatus::Pending { generation: 1 });

        let settled = tracker.flush().await;
        assert_eq!(
            settled,
            SyncStatus::Synced {
                generation: 1,
                at: fixed_now()
            }
        );
        let stored = repo.get_progress(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.into_progress(), *tracker.progress());
    }

    #[tokio::test]
    async fn repeated_completion_queues_nothing() {
        let repo = Arc::new(Flaky::new(0));
        let mut tracker = owned(repo.clone(), quick_policy(1));

        tracker.complete_task(TaskId::ClaimWrite);
        tracker.flush().await;
        assert_eq!(
            tracker.complete_task(TaskId::ClaimWrite),
            Completion::AlreadyCompleted
        );
        tracker.flush().await;
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_writes_retry_then_succeed() {
        let repo = Arc::new(Flaky::new(2));
        let mut tracker = owned(repo.clone(), quick_policy(5));

        tracker.complete_task(TaskId::ClaimWrite);
        let status = tracker.flush().await;
        assert!(matches!(status, SyncStatus::Synced { generation: 1, .. }));
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_local_state() {
        let repo = Arc::new(Flaky::new(10));
        let mut tracker = owned(repo.clone(), quick_policy(3));

        tracker.complete_task(TaskId::ClaimWrite);
        let status = tracker.flush().await;
        assert!(matches!(
            status,
            SyncStatus::Failed {
                generation: 1,
                attempts: 3,
                ..
            }
        ));
        assert!(status.is_unsaved());
        assert_eq!(tracker.stage(), Stage::DamageInfo);
        assert!(tracker.progress().is_completed(TaskId::ClaimWrite));
    }

    #[tokio::test(start_paused = true)]
    async fn later_snapshot_supersedes_one_being_retried() {
        let repo = Arc::new(Flaky::new(1));
        let mut tracker = owned(repo.clone(), quick_policy(5));

        tracker.complete_task(TaskId::ClaimWrite);
        tracker.complete_task(TaskId::PhotoUpload);
        tracker.complete_task(TaskId::DocsGuide);
        let status = tracker.flush().await;
        assert!(matches!(status, SyncStatus::Synced { generation: 3, .. }));

        let writes = repo.writes.lock().unwrap();
        let last = writes.last().unwrap();
        assert_eq!(last.stage, Stage::Treatment);
        assert_eq!(last.completed_tasks.len(), 3);
    }

    #[tokio::test]
    async fn local_only_never_writes() {
        let mut tracker = ProgressTracker::local_only(fixed_clock());
        tracker.complete_task(TaskId::ClaimWrite);
        tracker.reset();
        assert_eq!(tracker.flush().await, SyncStatus::LocalOnly);
        assert_eq!(*tracker.subscribe().borrow(), SyncStatus::LocalOnly);
        assert_eq!(tracker.owner(), None);
    }

    #[tokio::test]
    async fn hydration_adopts_record_without_writing() {
        let repo = Arc::new(Flaky::new(0));
        let tasks: CompletedTasks = [TaskId::ClaimWrite, TaskId::PhotoUpload, TaskId::DocsGuide]
            .into_iter()
            .collect();
        let record = ProgressRecord {
            user_id: UserId::new(1),
            stage: Stage::Treatment,
            completed_tasks: tasks.clone(),
            updated_at: fixed_now(),
        };
        let tracker = ProgressTracker::hydrated(
            UserId::new(1),
            Some(record),
            fixed_clock(),
            repo.clone(),
            quick_policy(1),
        );

        assert_eq!(tracker.stage(), Stage::Treatment);
        assert_eq!(tracker.progress().completed_tasks(), &tasks);
        assert_eq!(tracker.sync_status(), SyncStatus::Idle);
        assert_eq!(tracker.flush().await, SyncStatus::Idle);
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_persists_cleared_state() {
        let repo = Arc::new(Flaky::new(0));
        let mut tracker = owned(repo.clone(), quick_policy(1));
        tracker.complete_task(TaskId::ClaimWrite);
        tracker.complete_task(TaskId::MedGuarantee);
        tracker.reset();
        tracker.flush().await;

        let writes = repo.writes.lock().unwrap();
        let last = writes.last().unwrap();
        assert_eq!(last.stage, Stage::IntakeReceived);
        assert!(last.completed_tasks.is_empty());
    }

    #[test]
    fn snapshot_flattens_progress() {
        let mut tracker = ProgressTracker::local_only(fixed_clock());
        tracker.complete_task(TaskId::ClaimWrite);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "currentStep": 1,
                "completedTasks": ["claim-write"],
                "stageLabel": "damage info",
                "sync": {"state": "localOnly"}
            })
        );
    }
}

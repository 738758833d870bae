use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use claim_core::model::{Completion, TaskId, UserId};
use storage::repository::ProgressRepository;
use tokio::sync::Mutex;

use super::retry::RetryPolicy;
use super::sync::SyncStatus;
use super::tracker::{ProgressSnapshot, ProgressTracker};
use crate::Clock;
use crate::error::ProgressServiceError;
use crate::session::SessionState;

pub type SharedTracker = Arc<Mutex<ProgressTracker>>;

/// Outcome of completing a task through the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub completion: Completion,
    pub snapshot: ProgressSnapshot,
}

/// Cached trackers. `draining` holds released trackers until their queued writes settle.
#[derive(Default)]
struct Registry {
    live: HashMap<UserId, SharedTracker>,
    draining: HashMap<UserId, SharedTracker>,
}

/// Owns one tracker per logged-in user, hydrated on first use.
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    policy: RetryPolicy,
    allow_reset: bool,
    trackers: Mutex<Registry>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        policy: RetryPolicy,
        allow_reset: bool,
    ) -> Self {
        Self {
            clock,
            progress,
            policy,
            allow_reset,
            trackers: Mutex::new(Registry::default()),
        }
    }

    #[must_use]
    pub fn allow_reset(&self) -> bool {
        self.allow_reset
    }

    /// Tracker for the session: the user's cached tracker, or a fresh local-only one.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if hydration cannot read the stored row.
    /// Nothing is cached in that case, so the next call retries.
    pub async fn tracker(&self, session: &SessionState) -> Result<SharedTracker, ProgressServiceError> {
        match session.user_id() {
            Some(user_id) => self.tracker_for(user_id).await,
            None => Ok(Arc::new(Mutex::new(ProgressTracker::local_only(self.clock)))),
        }
    }

    async fn tracker_for(&self, user_id: UserId) -> Result<SharedTracker, ProgressServiceError> {
        let mut trackers = self.trackers.lock().await;
        if let Some(tracker) = trackers.live.get(&user_id) {
            return Ok(Arc::clone(tracker));
        }
        // Storage may not hold the draining tracker's writes yet; its memory is newer.
        if let Some(tracker) = trackers.draining.remove(&user_id) {
            tracing::debug!(%user_id, "reviving draining progress tracker");
            trackers.live.insert(user_id, Arc::clone(&tracker));
            return Ok(tracker);
        }

        let record = self.progress.get_progress(user_id).await?;
        tracing::debug!(%user_id, found = record.is_some(), "hydrating progress");
        let tracker = Arc::new(Mutex::new(ProgressTracker::hydrated(
            user_id,
            record,
            self.clock,
            Arc::clone(&self.progress),
            self.policy,
        )));
        trackers.live.insert(user_id, Arc::clone(&tracker));
        Ok(tracker)
    }

    /// Current progress. Anonymous sessions always see the zero state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if hydration fails.
    pub async fn snapshot(&self, session: &SessionState) -> Result<ProgressSnapshot, ProgressServiceError> {
        let tracker = self.tracker(session).await?;
        let snapshot = tracker.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Complete `task` for the session's user. Returns as soon as memory is updated.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if hydration fails. Write failures
    /// surface only through `SyncStatus`.
    pub async fn complete_task(
        &self,
        session: &SessionState,
        task: TaskId,
    ) -> Result<TaskOutcome, ProgressServiceError> {
        let tracker = self.tracker(session).await?;
        let mut tracker = tracker.lock().await;
        let completion = tracker.complete_task(task);
        Ok(TaskOutcome {
            completion,
            snapshot: tracker.snapshot(),
        })
    }

    /// Clear the session user's progress, locally and in storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::ResetDisabled` unless reset was enabled.
    /// Returns `ProgressServiceError::Storage` if hydration fails.
    pub async fn reset(&self, session: &SessionState) -> Result<ProgressSnapshot, ProgressServiceError> {
        if !self.allow_reset {
            return Err(ProgressServiceError::ResetDisabled);
        }
        let tracker = self.tracker(session).await?;
        let mut tracker = tracker.lock().await;
        tracker.reset();
        Ok(tracker.snapshot())
    }

    /// Wait for the user's queued writes to settle. Unknown users report `Idle`.
    pub async fn flush(&self, user_id: UserId) -> SyncStatus {
        let tracker = {
            let trackers = self.trackers.lock().await;
            let found = trackers
                .live
                .get(&user_id)
                .or_else(|| trackers.draining.get(&user_id))
                .cloned();
            found
        };
        let Some(tracker) = tracker else {
            return SyncStatus::Idle;
        };
        let pending = tracker.lock().await.flush();
        pending.await
    }

    /// Release the cached tracker (logout) once its queued writes have settled.
    ///
    /// A request for the same user while the writes drain gets the released
    /// tracker back instead of re-reading storage.
    pub async fn forget(&self, user_id: UserId) {
        let tracker = {
            let mut trackers = self.trackers.lock().await;
            let Some(tracker) = trackers.live.remove(&user_id) else {
                return;
            };
            trackers.draining.insert(user_id, Arc::clone(&tracker));
            tracker
        };

        let pending = tracker.lock().await.flush();
        let status = pending.await;

        let mut trackers = self.trackers.lock().await;
        if trackers
            .draining
            .get(&user_id)
            .is_some_and(|draining| Arc::ptr_eq(draining, &tracker))
        {
            trackers.draining.remove(&user_id);
            tracing::debug!(%user_id, sync = ?status, "progress tracker released");
        }
    }

    /// Release the trackers of every user not in `active`. Returns how many were released.
    pub async fn release_inactive(&self, active: &HashSet<UserId>) -> usize {
        let idle: Vec<UserId> = self
            .trackers
            .lock()
            .await
            .live
            .keys()
            .filter(|user_id| !active.contains(user_id))
            .copied()
            .collect();
        for user_id in &idle {
            self.forget(*user_id).await;
        }
        idle.len()
    }

    /// Whether a tracker for `user_id` is held, live or draining.
    pub async fn is_cached(&self, user_id: UserId) -> bool {
        let trackers = self.trackers.lock().await;
        trackers.live.contains_key(&user_id) || trackers.draining.contains_key(&user_id)
    }

    /// Settle every cached tracker's writes; used on shutdown.
    pub async fn flush_all(&self) {
        let trackers: Vec<SharedTracker> = {
            let trackers = self.trackers.lock().await;
            let all = trackers
                .live
                .values()
                .chain(trackers.draining.values())
                .cloned()
                .collect();
            all
        };
        for tracker in trackers {
            let pending = tracker.lock().await.flush();
            pending.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claim_core::model::{CompletedTasks, Stage, UserIdentity};
    use claim_core::time::{fixed_clock, fixed_now};
    use std::time::Duration;
    use storage::ProgressRecord;
    use storage::repository::{InMemoryRepository, StorageError};

    /// Takes 50ms per write.
    struct Slow(InMemoryRepository);

    #[async_trait]
    impl ProgressRepository for Slow {
        async fn get_progress(
            &self,
            user_id: UserId,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            self.0.get_progress(user_id).await
        }

        async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.upsert_progress(record).await
        }
    }

    fn slow_service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            Arc::new(Slow(repo.clone())),
            RetryPolicy::no_retry(),
            false,
        )
    }

    fn session(id: u64) -> SessionState {
        SessionState::LoggedIn(UserIdentity {
            id: UserId::new(id),
            name: "Kim".into(),
            phone: "01012345678".into(),
        })
    }

    fn service(repo: &InMemoryRepository, allow_reset: bool) -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            RetryPolicy::no_retry(),
            allow_reset,
        )
    }

    #[tokio::test]
    async fn anonymous_reads_zero_and_writes_nothing() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, false);

        let outcome = svc
            .complete_task(&SessionState::Anonymous, TaskId::ClaimWrite)
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.sync, SyncStatus::LocalOnly);

        let snapshot = svc.snapshot(&SessionState::Anonymous).await.unwrap();
        assert_eq!(snapshot.progress.stage(), Stage::IntakeReceived);
        assert!(snapshot.progress.completed_tasks().is_empty());
    }

    #[tokio::test]
    async fn tracker_is_hydrated_once_per_user() {
        let repo = InMemoryRepository::new();
        let tasks: CompletedTasks = [TaskId::ClaimWrite].into_iter().collect();
        repo.upsert_progress(&ProgressRecord {
            user_id: UserId::new(4),
            stage: Stage::DamageInfo,
            completed_tasks: tasks,
            updated_at: fixed_now(),
        })
        .await
        .unwrap();
        let svc = service(&repo, false);

        let first = svc.tracker(&session(4)).await.unwrap();
        let second = svc.tracker(&session(4)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().await.stage(), Stage::DamageInfo);
    }

    #[tokio::test]
    async fn completion_reaches_storage_after_flush() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, false);
        let user = session(9);

        svc.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        svc.complete_task(&user, TaskId::MedGuarantee).await.unwrap();
        let status = svc.flush(UserId::new(9)).await;
        assert!(matches!(status, SyncStatus::Synced { generation: 2, .. }));

        let stored = repo.get_progress(UserId::new(9)).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::BenefitPayment);
    }

    #[tokio::test]
    async fn forget_rehydrates_from_storage() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, false);
        let user = session(2);

        svc.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        svc.flush(UserId::new(2)).await;
        svc.forget(UserId::new(2)).await;

        let snapshot = svc.snapshot(&user).await.unwrap();
        assert_eq!(snapshot.progress.stage(), Stage::DamageInfo);
        assert_eq!(snapshot.sync, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn forget_waits_for_queued_write() {
        let repo = InMemoryRepository::new();
        let svc = slow_service(&repo);
        let user = session(6);

        svc.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        svc.forget(UserId::new(6)).await;
        assert!(!svc.is_cached(UserId::new(6)).await);

        let snapshot = svc.snapshot(&user).await.unwrap();
        assert_eq!(snapshot.progress.stage(), Stage::DamageInfo);

        svc.complete_task(&user, TaskId::PhotoUpload).await.unwrap();
        svc.flush(UserId::new(6)).await;
        let stored = repo.get_progress(UserId::new(6)).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DamageInfo);
        assert_eq!(stored.completed_tasks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_drain_reuses_released_tracker() {
        let repo = InMemoryRepository::new();
        let svc = slow_service(&repo);
        let user = session(8);

        svc.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        let ((), outcome) = tokio::join!(svc.forget(UserId::new(8)), async {
            tokio::task::yield_now().await;
            svc.complete_task(&user, TaskId::PhotoUpload).await.unwrap()
        });
        assert_eq!(outcome.snapshot.progress.completed_tasks().len(), 2);
        assert!(svc.is_cached(UserId::new(8)).await);

        svc.flush(UserId::new(8)).await;
        let stored = repo.get_progress(UserId::new(8)).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DamageInfo);
        assert!(stored.completed_tasks.contains(TaskId::ClaimWrite));
        assert!(stored.completed_tasks.contains(TaskId::PhotoUpload));
    }

    #[tokio::test]
    async fn release_inactive_keeps_active_users() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, false);

        svc.complete_task(&session(1), TaskId::ClaimWrite).await.unwrap();
        svc.complete_task(&session(2), TaskId::ClaimWrite).await.unwrap();
        let active: HashSet<UserId> = [UserId::new(1)].into_iter().collect();

        assert_eq!(svc.release_inactive(&active).await, 1);
        assert!(svc.is_cached(UserId::new(1)).await);
        assert!(!svc.is_cached(UserId::new(2)).await);
        let stored = repo.get_progress(UserId::new(2)).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DamageInfo);
    }

    #[tokio::test]
    async fn reset_requires_opt_in() {
        let repo = InMemoryRepository::new();
        let user = session(5);

        let locked = service(&repo, false);
        locked.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        assert!(matches!(
            locked.reset(&user).await,
            Err(ProgressServiceError::ResetDisabled)
        ));
        locked.flush(UserId::new(5)).await;

        let open = service(&repo, true);
        open.complete_task(&user, TaskId::ClaimWrite).await.unwrap();
        let snapshot = open.reset(&user).await.unwrap();
        assert_eq!(snapshot.progress.stage(), Stage::IntakeReceived);
        open.flush(UserId::new(5)).await;
        let stored = repo.get_progress(UserId::new(5)).await.unwrap().unwrap();
        assert!(stored.completed_tasks.is_empty());
    }

    #[tokio::test]
    async fn flush_of_unknown_user_is_idle() {
        let svc = service(&InMemoryRepository::new(), false);
        assert_eq!(svc.flush(UserId::new(77)).await, SyncStatus::Idle);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claim_core::model::{
    AccidentPhoto, ChatMessage, Claim, ClaimId, CompletedTasks, GuaranteeId, MedGuaranteeRequest,
    MessageId, NewChatMessage, PhotoId, Progress, Stage, User, UserId, ValidatedClaim,
    ValidatedLogin, ValidatedMedGuarantee, ValidatedPhoto,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Persisted shape of one user's progress row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub stage: Stage,
    pub completed_tasks: CompletedTasks,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_progress(user_id: UserId, progress: &Progress, updated_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            stage: progress.stage(),
            completed_tasks: progress.completed_tasks().clone(),
            updated_at,
        }
    }

    /// Adopt the stored values verbatim.
    #[must_use]
    pub fn into_progress(self) -> Progress {
        Progress::from_persisted(self.stage, self.completed_tasks)
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user keyed by identity key, or refresh name/phone of an existing one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(
        &self,
        login: &ValidatedLogin,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError>;

    /// Fetch a user by id. Returns `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress row for a user. Returns `Ok(None)` when none exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures or malformed rows.
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or fully overwrite the row for `record.user_id`.
    ///
    /// Re-applying the same record only moves `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the claim cannot be stored.
    async fn insert_claim(
        &self,
        user_id: UserId,
        claim: &ValidatedClaim,
    ) -> Result<Claim, StorageError>;

    /// Most recently created claim for the user, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn latest_claim(&self, user_id: UserId) -> Result<Option<Claim>, StorageError>;
}

#[async_trait]
pub trait MedGuaranteeRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the request cannot be stored.
    async fn insert_request(
        &self,
        user_id: UserId,
        request: &ValidatedMedGuarantee,
    ) -> Result<MedGuaranteeRequest, StorageError>;
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the metadata cannot be stored.
    async fn insert_photo(
        &self,
        user_id: UserId,
        photo: &ValidatedPhoto,
    ) -> Result<AccidentPhoto, StorageError>;

    /// Photos of a case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn photos_for_case(&self, case_id: &str) -> Result<Vec<AccidentPhoto>, StorageError>;
}

#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the message cannot be stored.
    async fn append_message(&self, message: &NewChatMessage) -> Result<ChatMessage, StorageError>;

    /// A user's messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn history(&self, user_id: UserId) -> Result<Vec<ChatMessage>, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    progress: HashMap<UserId, ProgressRecord>,
    claims: Vec<Claim>,
    guarantees: Vec<MedGuaranteeRequest>,
    photos: Vec<AccidentPhoto>,
    messages: Vec<ChatMessage>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn next_id(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX).saturating_add(1)
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(
        &self,
        login: &ValidatedLogin,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard.users.iter_mut().find(|user| user.ci == login.ci) {
            existing.name.clone_from(&login.name);
            existing.phone.clone_from(&login.phone);
            return Ok(existing.clone());
        }
        let user = User {
            id: UserId::new(next_id(guard.users.len())),
            ci: login.ci.clone(),
            name: login.name.clone(),
            phone: login.phone.clone(),
            created_at: now,
        };
        guard.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.progress.get(&user_id).cloned())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.progress.insert(record.user_id, record.clone());
        Ok(())
    }
}

#[async_trait]
impl ClaimRepository for InMemoryRepository {
    async fn insert_claim(
        &self,
        user_id: UserId,
        claim: &ValidatedClaim,
    ) -> Result<Claim, StorageError> {
        let mut guard = self.lock()?;
        let stored = claim
            .clone()
            .assign_id(ClaimId::new(next_id(guard.claims.len())), user_id);
        guard.claims.push(stored.clone());
        Ok(stored)
    }

    async fn latest_claim(&self, user_id: UserId) -> Result<Option<Claim>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .claims
            .iter()
            .filter(|claim| claim.user_id == user_id)
            .max_by_key(|claim| (claim.created_at, claim.id))
            .cloned())
    }
}

#[async_trait]
impl MedGuaranteeRepository for InMemoryRepository {
    async fn insert_request(
        &self,
        user_id: UserId,
        request: &ValidatedMedGuarantee,
    ) -> Result<MedGuaranteeRequest, StorageError> {
        let mut guard = self.lock()?;
        let stored = request
            .clone()
            .assign_id(GuaranteeId::new(next_id(guard.guarantees.len())), user_id);
        guard.guarantees.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl PhotoRepository for InMemoryRepository {
    async fn insert_photo(
        &self,
        user_id: UserId,
        photo: &ValidatedPhoto,
    ) -> Result<AccidentPhoto, StorageError> {
        let mut guard = self.lock()?;
        let stored = photo
            .clone()
            .assign_id(PhotoId::new(next_id(guard.photos.len())), user_id);
        guard.photos.push(stored.clone());
        Ok(stored)
    }

    async fn photos_for_case(&self, case_id: &str) -> Result<Vec<AccidentPhoto>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<AccidentPhoto> = guard
            .photos
            .iter()
            .filter(|photo| photo.case_id == case_id)
            .cloned()
            .collect();
        found.sort_by_key(|photo| (photo.created_at, photo.id));
        Ok(found)
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryRepository {
    async fn append_message(&self, message: &NewChatMessage) -> Result<ChatMessage, StorageError> {
        let mut guard = self.lock()?;
        let stored = ChatMessage {
            id: MessageId::new(next_id(guard.messages.len())),
            user_id: message.user_id,
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
        };
        guard.messages.push(stored.clone());
        Ok(stored)
    }

    async fn history(&self, user_id: UserId) -> Result<Vec<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<ChatMessage> = guard
            .messages
            .iter()
            .filter(|message| message.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|message| (message.created_at, message.id));
        Ok(found)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub claims: Arc<dyn ClaimRepository>,
    pub guarantees: Arc<dyn MedGuaranteeRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    pub(crate) fn from_repo<R>(repo: R) -> Self
    where
        R: UserRepository
            + ProgressRepository
            + ClaimRepository
            + MedGuaranteeRepository
            + PhotoRepository
            + ChatMessageRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            claims: Arc::new(repo.clone()),
            guarantees: Arc::new(repo.clone()),
            photos: Arc::new(repo.clone()),
            messages: Arc::new(repo),
        }
    }
}

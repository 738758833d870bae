use std::sync::Arc;

use claim_core::model::{Claim, ClaimDraft, TaskId, UserId};
use storage::repository::ClaimRepository;

use crate::Clock;
use crate::error::ClaimServiceError;
use crate::progress::ProgressService;
use crate::session::SessionState;

/// Stores claim forms and marks `claim-write` done.
#[derive(Clone)]
pub struct ClaimService {
    clock: Clock,
    claims: Arc<dyn ClaimRepository>,
    progress: Arc<ProgressService>,
}

impl ClaimService {
    #[must_use]
    pub fn new(
        clock: Clock,
        claims: Arc<dyn ClaimRepository>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            clock,
            claims,
            progress,
        }
    }

    /// Validate and store a claim, then complete the `claim-write` task.
    ///
    /// # Errors
    ///
    /// Returns `ClaimServiceError::Unauthenticated` for anonymous sessions.
    /// Returns `ClaimServiceError::Validation` listing every invalid field.
    /// Returns `ClaimServiceError::Progress` if progress cannot be loaded; nothing is stored then.
    /// Returns `ClaimServiceError::Storage` if the claim cannot be stored.
    pub async fn submit(
        &self,
        session: &SessionState,
        draft: ClaimDraft,
    ) -> Result<Claim, ClaimServiceError> {
        let user_id = require_user(session)?;
        let claim = draft.validate(self.clock.now())?;
        // Load progress before the insert so a stored claim always advances it.
        let tracker = self.progress.tracker(session).await?;
        let stored = self.claims.insert_claim(user_id, &claim).await?;
        tracing::info!(%user_id, claim_id = %stored.id, "claim submitted");
        tracker.lock().await.complete_task(TaskId::ClaimWrite);
        Ok(stored)
    }

    /// Most recent claim of the session user, if any.
    ///
    /// # Errors
    ///
    /// Returns `ClaimServiceError::Unauthenticated` for anonymous sessions.
    /// Returns `ClaimServiceError::Storage` on repository failures.
    pub async fn latest(&self, session: &SessionState) -> Result<Option<Claim>, ClaimServiceError> {
        let user_id = require_user(session)?;
        Ok(self.claims.latest_claim(user_id).await?)
    }

    /// Whether the session user has submitted at least one claim.
    ///
    /// # Errors
    ///
    /// Same as [`ClaimService::latest`].
    pub async fn has_claim(&self, session: &SessionState) -> Result<bool, ClaimServiceError> {
        Ok(self.latest(session).await?.is_some())
    }
}

pub(crate) fn require_user(session: &SessionState) -> Result<UserId, ClaimServiceError> {
    session.user_id().ok_or(ClaimServiceError::Unauthenticated)
}

use std::sync::Arc;

use claim_core::model::{MedGuaranteeDraft, MedGuaranteeRequest, TaskId};
use storage::repository::MedGuaranteeRepository;

use crate::Clock;
use crate::claim_service::require_user;
use crate::error::ClaimServiceError;
use crate::progress::ProgressService;
use crate::session::SessionState;

/// Files hospital payment-guarantee requests.
#[derive(Clone)]
pub struct MedGuaranteeService {
    clock: Clock,
    requests: Arc<dyn MedGuaranteeRepository>,
    progress: Arc<ProgressService>,
}

impl MedGuaranteeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        requests: Arc<dyn MedGuaranteeRepository>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            clock,
            requests,
            progress,
        }
    }

    /// Store a guarantee request, then complete the `med-guarantee` task.
    ///
    /// # Errors
    ///
    /// Returns `ClaimServiceError::Unauthenticated` for anonymous sessions.
    /// Returns `ClaimServiceError::Validation` for missing fields.
    /// Returns `ClaimServiceError::Storage` if the request cannot be stored.
    pub async fn request(
        &self,
        session: &SessionState,
        draft: MedGuaranteeDraft,
    ) -> Result<MedGuaranteeRequest, ClaimServiceError> {
        let user_id = require_user(session)?;
        let request = draft.validate(self.clock.now())?;
        let tracker = self.progress.tracker(session).await?;
        let stored = self.requests.insert_request(user_id, &request).await?;
        tracing::info!(%user_id, request_id = %stored.id, "guarantee requested");
        tracker.lock().await.complete_task(TaskId::MedGuarantee);
        Ok(stored)
    }
}

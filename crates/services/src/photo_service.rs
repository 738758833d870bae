use std::sync::Arc;

use claim_core::model::{AccidentPhoto, PhotoDraft, TaskId};
use storage::repository::PhotoRepository;

use crate::Clock;
use crate::error::PhotoServiceError;
use crate::progress::ProgressService;
use crate::session::SessionState;

/// Registers metadata for accident photos already uploaded to object storage.
#[derive(Clone)]
pub struct PhotoService {
    clock: Clock,
    photos: Arc<dyn PhotoRepository>,
    progress: Arc<ProgressService>,
}

impl PhotoService {
    #[must_use]
    pub fn new(clock: Clock, photos: Arc<dyn PhotoRepository>, progress: Arc<ProgressService>) -> Self {
        Self {
            clock,
            photos,
            progress,
        }
    }

    /// Register one photo and complete the `photo-upload` task.
    ///
    /// # Errors
    ///
    /// Returns `PhotoServiceError::Unauthenticated` for anonymous sessions.
    /// Returns `PhotoServiceError::Photo` for invalid metadata.
    /// Returns `PhotoServiceError::Progress` if progress cannot be loaded; nothing is stored then.
    /// Returns `PhotoServiceError::Storage` if the metadata cannot be stored.
    pub async fn register(
        &self,
        session: &SessionState,
        draft: PhotoDraft,
    ) -> Result<AccidentPhoto, PhotoServiceError> {
        let user_id = session.user_id().ok_or(PhotoServiceError::Unauthenticated)?;
        let photo = draft.validate(self.clock.now())?;
        let tracker = self.progress.tracker(session).await?;
        let stored = self.photos.insert_photo(user_id, &photo).await?;
        tracing::info!(%user_id, case_id = %stored.case_id, photo_id = %stored.id, "photo registered");
        tracker.lock().await.complete_task(TaskId::PhotoUpload);
        Ok(stored)
    }

    /// Photos of a case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `PhotoServiceError::Unauthenticated` for anonymous sessions.
    /// Returns `PhotoServiceError::Storage` on repository failures.
    pub async fn list(
        &self,
        session: &SessionState,
        case_id: &str,
    ) -> Result<Vec<AccidentPhoto>, PhotoServiceError> {
        if !session.is_logged_in() {
            return Err(PhotoServiceError::Unauthenticated);
        }
        Ok(self.photos.photos_for_case(case_id.trim()).await?)
    }
}

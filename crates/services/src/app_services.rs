use std::sync::Arc;

use chrono::Duration;
use storage::repository::Storage;

use crate::Clock;
use crate::auth_service::AuthService;
use crate::chat_service::{ChatProxyConfig, ChatService};
use crate::claim_service::ClaimService;
use crate::dashboard::DashboardService;
use crate::error::AppServicesError;
use crate::med_guarantee_service::MedGuaranteeService;
use crate::photo_service::PhotoService;
use crate::progress::{ProgressService, RetryPolicy};
use crate::session::{DEFAULT_SESSION_TTL_SECS, SessionStore};

/// Knobs the binary passes down to the services.
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub session_ttl: Duration,
    pub allow_progress_reset: bool,
    pub retry: RetryPolicy,
    pub chat: Option<ChatProxyConfig>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            allow_progress_reset: false,
            retry: RetryPolicy::default(),
            chat: None,
        }
    }
}

/// Assembles every app-facing service over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    progress: Arc<ProgressService>,
    claims: Arc<ClaimService>,
    med_guarantee: Arc<MedGuaranteeService>,
    photos: Arc<PhotoService>,
    chat: Arc<ChatService>,
    dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the chat
    /// client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, settings)
    }

    /// Build services over in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Chat` if the chat client cannot be built.
    pub fn in_memory(clock: Clock, settings: ServiceSettings) -> Result<Self, AppServicesError> {
        Self::from_storage(&Storage::in_memory(), clock, settings)
    }

    fn from_storage(
        storage: &Storage,
        clock: Clock,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            settings.retry,
            settings.allow_progress_reset,
        ));
        let auth = Arc::new(AuthService::new(
            clock,
            Arc::clone(&storage.users),
            SessionStore::new(clock, settings.session_ttl),
        ));
        let claims = Arc::new(ClaimService::new(
            clock,
            Arc::clone(&storage.claims),
            Arc::clone(&progress),
        ));
        let med_guarantee = Arc::new(MedGuaranteeService::new(
            clock,
            Arc::clone(&storage.guarantees),
            Arc::clone(&progress),
        ));
        let photos = Arc::new(PhotoService::new(
            clock,
            Arc::clone(&storage.photos),
            Arc::clone(&progress),
        ));
        if settings.chat.is_none() {
            tracing::info!("chat proxy disabled: no webhook configured");
        }
        let chat = Arc::new(ChatService::new(
            clock,
            settings.chat,
            Arc::clone(&storage.messages),
        )?);
        let dashboard = Arc::new(DashboardService::new(
            Arc::clone(&progress),
            Arc::clone(&storage.claims),
        ));

        Ok(Self {
            auth,
            progress,
            claims,
            med_guarantee,
            photos,
            chat,
            dashboard,
        })
    }

    /// Purge expired sessions, then release the progress trackers of users
    /// left without a live session. Returns the number of trackers released.
    pub async fn sweep_sessions(&self) -> usize {
        let sessions = self.auth.sessions();
        let purged = sessions.purge_expired().await;
        let active = sessions.live_users().await;
        let released = self.progress.release_inactive(&active).await;
        if purged > 0 || released > 0 {
            tracing::info!(purged, released, "swept expired sessions");
        }
        released
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn claims(&self) -> Arc<ClaimService> {
        Arc::clone(&self.claims)
    }

    #[must_use]
    pub fn med_guarantee(&self) -> Arc<MedGuaranteeService> {
        Arc::clone(&self.med_guarantee)
    }

    #[must_use]
    pub fn photos(&self) -> Arc<PhotoService> {
        Arc::clone(&self.photos)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }
}

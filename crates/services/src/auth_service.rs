use std::sync::Arc;

use claim_core::model::{LoginDraft, UserId, UserIdentity};
use storage::repository::UserRepository;

use crate::Clock;
use crate::error::AuthError;
use crate::session::{SessionState, SessionStore, SessionToken};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: SessionToken,
    pub identity: UserIdentity,
}

/// Turns verified phone logins into server-side sessions.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    sessions: SessionStore,
}

impl AuthService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>, sessions: SessionStore) -> Self {
        Self {
            clock,
            users,
            sessions,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Validate the login, upsert the account by identity key and open a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Login` for invalid details.
    /// Returns `AuthError::Storage` if the account cannot be stored.
    pub async fn login(&self, draft: LoginDraft) -> Result<LoginOutcome, AuthError> {
        let login = draft.validate()?;
        let user = self.users.upsert_user(&login, self.clock.now()).await?;
        let identity = user.identity();
        let token = self.sessions.create(identity.clone()).await;
        tracing::info!(user_id = %identity.id, "user logged in");
        Ok(LoginOutcome { token, identity })
    }

    /// Resolve an optional cookie value to a session.
    pub async fn resolve(&self, token: Option<&str>) -> SessionState {
        match token {
            Some(raw) if !raw.is_empty() => self.sessions.resolve(&SessionToken::from(raw)).await,
            _ => SessionState::Anonymous,
        }
    }

    /// End a session. Returns the user it belonged to.
    pub async fn logout(&self, token: &str) -> Option<UserId> {
        let user_id = self.sessions.remove(&SessionToken::from(token)).await;
        if let Some(user_id) = user_id {
            tracing::info!(%user_id, "user logged out");
        }
        user_id
    }
}

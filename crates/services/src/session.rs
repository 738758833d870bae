use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use claim_core::model::{UserId, UserIdentity};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::Clock;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "auth_session";

/// Default session lifetime: thirty minutes.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

/// What a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    LoggedIn(UserIdentity),
}

impl SessionState {
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            SessionState::Anonymous => None,
            SessionState::LoggedIn(identity) => Some(identity.id),
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::LoggedIn(identity) => Some(identity),
        }
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::LoggedIn(_))
    }

    /// Wire shape answered to `GET /api/session`.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        match self {
            SessionState::Anonymous => SessionInfo {
                is_logged_in: false,
                user_id: None,
                name: None,
                phone: None,
            },
            SessionState::LoggedIn(identity) => SessionInfo {
                is_logged_in: true,
                user_id: Some(identity.id),
                name: Some(identity.name.clone()),
                phone: Some(identity.phone.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Opaque server-side session handle.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone)]
struct SessionEntry {
    identity: UserIdentity,
    expires_at: DateTime<Utc>,
}

/// In-memory token store with a fixed time-to-live.
///
/// Clones share the same table.
#[derive(Clone)]
pub struct SessionStore {
    clock: Clock,
    ttl: Duration,
    sessions: Arc<Mutex<HashMap<SessionToken, SessionEntry>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(clock: Clock, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Same table, different clock.
    #[must_use]
    pub fn with_clock(&self, clock: Clock) -> Self {
        Self {
            clock,
            ttl: self.ttl,
            sessions: Arc::clone(&self.sessions),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create(&self, identity: UserIdentity) -> SessionToken {
        let token = SessionToken::generate();
        let entry = SessionEntry {
            identity,
            expires_at: self.clock.now() + self.ttl,
        };
        self.sessions.lock().await.insert(token.clone(), entry);
        token
    }

    /// Look a token up, evicting it when expired.
    pub async fn resolve(&self, token: &SessionToken) -> SessionState {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(entry) if entry.expires_at > now => SessionState::LoggedIn(entry.identity.clone()),
            Some(_) => {
                sessions.remove(token);
                tracing::debug!("session expired");
                SessionState::Anonymous
            }
            None => SessionState::Anonymous,
        }
    }

    /// Drop a session. Returns the user it belonged to, if it existed.
    pub async fn remove(&self, token: &SessionToken) -> Option<UserId> {
        self.sessions
            .lock()
            .await
            .remove(token)
            .map(|entry| entry.identity.id)
    }

    /// Drop every expired session; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }

    /// Users holding at least one unexpired session.
    pub async fn live_users(&self) -> HashSet<UserId> {
        let now = self.clock.now();
        self.sessions
            .lock()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.identity.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_core::time::fixed_clock;

    fn identity(id: u64) -> UserIdentity {
        UserIdentity {
            id: UserId::new(id),
            name: "Kim".into(),
            phone: "01012345678".into(),
        }
    }

    #[tokio::test]
    async fn token_resolves_until_ttl_elapses() {
        let store = SessionStore::new(fixed_clock(), Duration::minutes(30));
        let token = store.create(identity(7)).await;

        let later = store.with_clock(fixed_clock().advanced(Duration::minutes(29)));
        assert_eq!(later.resolve(&token).await.user_id(), Some(UserId::new(7)));

        let expired = store.with_clock(fixed_clock().advanced(Duration::minutes(30)));
        assert_eq!(expired.resolve(&token).await, SessionState::Anonymous);
        // evicted, so even the original clock no longer sees it
        assert_eq!(store.resolve(&token).await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn unknown_token_is_anonymous() {
        let store = SessionStore::new(fixed_clock(), Duration::minutes(30));
        let state = store.resolve(&SessionToken::from("nope")).await;
        assert!(!state.is_logged_in());
        assert_eq!(state.info().user_id, None);
    }

    #[tokio::test]
    async fn remove_reports_owner_once() {
        let store = SessionStore::new(fixed_clock(), Duration::minutes(30));
        let token = store.create(identity(3)).await;
        assert_eq!(store.remove(&token).await, Some(UserId::new(3)));
        assert_eq!(store.remove(&token).await, None);
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = SessionStore::new(fixed_clock(), Duration::minutes(30));
        store.create(identity(1)).await;
        let late = store.with_clock(fixed_clock().advanced(Duration::minutes(20)));
        let fresh = late.create(identity(2)).await;

        let sweeper = store.with_clock(fixed_clock().advanced(Duration::minutes(40)));
        assert_eq!(sweeper.purge_expired().await, 1);
        assert!(sweeper.resolve(&fresh).await.is_logged_in());
    }

    #[tokio::test]
    async fn live_users_skips_expired_sessions() {
        let store = SessionStore::new(fixed_clock(), Duration::minutes(30));
        store.create(identity(1)).await;
        store.create(identity(2)).await;
        let late = store.with_clock(fixed_clock().advanced(Duration::minutes(20)));
        late.create(identity(2)).await;

        let sweeper = store.with_clock(fixed_clock().advanced(Duration::minutes(40)));
        let live = sweeper.live_users().await;
        assert_eq!(live, [UserId::new(2)].into_iter().collect());
    }

    #[test]
    fn session_info_uses_wire_names() {
        let json = serde_json::to_value(SessionState::LoggedIn(identity(5)).info()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isLoggedIn": true, "userId": 5, "name": "Kim", "phone": "01012345678"})
        );
        let anon = serde_json::to_value(SessionState::Anonymous.info()).unwrap();
        assert_eq!(anon, serde_json::json!({"isLoggedIn": false}));
    }

    #[test]
    fn token_debug_is_redacted() {
        assert_eq!(format!("{:?}", SessionToken::from("secret")), "SessionToken(..)");
    }
}

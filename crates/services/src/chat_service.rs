use std::env;
use std::sync::Arc;
use std::time::Duration;

use claim_core::model::{ChatMessage, ChatRole, ChatText, NewChatMessage, UserId};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use storage::repository::ChatMessageRepository;
use url::Url;

use crate::Clock;
use crate::error::ChatServiceError;
use crate::session::SessionState;

/// Reply fields tried in order when the webhook answers with a JSON object.
const REPLY_FIELDS: [&str; 5] = ["msg", "output", "message", "text", "response"];

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ChatProxyConfig {
    pub webhook_url: Url,
    pub timeout: Duration,
}

impl ChatProxyConfig {
    /// Read `CLAIMDESK_CHAT_WEBHOOK_URL` and `CLAIMDESK_CHAT_TIMEOUT_SECS`.
    ///
    /// Returns `Ok(None)` when no webhook is configured.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::InvalidUrl` if the configured URL does not parse.
    pub fn from_env() -> Result<Option<Self>, ChatServiceError> {
        let Ok(raw) = env::var("CLAIMDESK_CHAT_WEBHOOK_URL") else {
            return Ok(None);
        };
        let timeout = env::var("CLAIMDESK_CHAT_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::parse(&raw, Duration::from_secs(timeout))
    }

    /// # Errors
    ///
    /// Returns `ChatServiceError::InvalidUrl` if `raw` is not an absolute URL.
    pub fn parse(raw: &str, timeout: Duration) -> Result<Option<Self>, ChatServiceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            webhook_url: Url::parse(raw)?,
            timeout,
        }))
    }
}

/// Relayed reply plus the stored messages, when the session was logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stored: Vec<ChatMessage>,
}

/// Forwards chat messages to an external webhook and keeps the transcript.
#[derive(Clone)]
pub struct ChatService {
    clock: Clock,
    client: Client,
    config: Option<ChatProxyConfig>,
    messages: Arc<dyn ChatMessageRepository>,
}

impl ChatService {
    /// # Errors
    ///
    /// Returns `ChatServiceError::Http` if the HTTP client cannot be built.
    pub fn new(
        clock: Clock,
        config: Option<ChatProxyConfig>,
        messages: Arc<dyn ChatMessageRepository>,
    ) -> Result<Self, ChatServiceError> {
        let timeout = config
            .as_ref()
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), |c| c.timeout);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            clock,
            client,
            config,
            messages,
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send `text` to the webhook and relay its reply.
    ///
    /// Logged-in sessions persist the user message before forwarding and the
    /// reply after; anonymous sessions are proxied without persistence.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Chat` for blank text.
    /// Returns `ChatServiceError::Disabled` when no webhook is configured.
    /// Returns `ChatServiceError::HttpStatus` or `Http` when the webhook fails.
    /// Returns `ChatServiceError::Storage` if a message cannot be stored.
    pub async fn send(
        &self,
        session: &SessionState,
        text: &str,
    ) -> Result<ChatReply, ChatServiceError> {
        let text = ChatText::new(text)?;
        let config = self.config.as_ref().ok_or(ChatServiceError::Disabled)?;
        let user_id = session.user_id();

        let mut stored = Vec::new();
        if let Some(user_id) = user_id {
            stored.push(self.append(user_id, ChatRole::User, text.as_str()).await?);
        }

        let response = self
            .client
            .post(config.webhook_url.clone())
            .json(&WebhookRequest {
                message: text.as_str(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "chat webhook rejected message");
            return Err(ChatServiceError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let reply = extract_reply(&body);
        if reply.trim().is_empty() {
            return Err(ChatServiceError::EmptyResponse);
        }

        if let Some(user_id) = user_id {
            stored.push(self.append(user_id, ChatRole::Assistant, &reply).await?);
        }
        tracing::debug!(user_id = ?user_id, "chat reply relayed");
        Ok(ChatReply { reply, stored })
    }

    /// The session user's transcript, oldest first. Anonymous sessions have none.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` on repository failures.
    pub async fn history(&self, session: &SessionState) -> Result<Vec<ChatMessage>, ChatServiceError> {
        match session.user_id() {
            Some(user_id) => Ok(self.messages.history(user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    async fn append(
        &self,
        user_id: UserId,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, ChatServiceError> {
        let message = NewChatMessage {
            user_id,
            role,
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        Ok(self.messages.append_message(&message).await?)
    }
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    message: &'a str,
}

/// Pull reply text out of a webhook body.
///
/// A JSON string is used as-is; an object yields its first string field among
/// `REPLY_FIELDS`; any other JSON is pretty-printed. Non-JSON bodies pass through.
fn extract_reply(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    if let Value::String(text) = value {
        return text;
    }
    value
        .as_object()
        .and_then(|fields| {
            REPLY_FIELDS
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
        })
        .map_or_else(|| pretty(&value), str::to_string)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

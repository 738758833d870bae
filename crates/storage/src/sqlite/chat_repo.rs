use async_trait::async_trait;
use claim_core::model::{ChatMessage, NewChatMessage, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_message_row, user_id_to_i64};
use crate::repository::{ChatMessageRepository, StorageError};

#[async_trait]
impl ChatMessageRepository for SqliteRepository {
    async fn append_message(&self, message: &NewChatMessage) -> Result<ChatMessage, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO chat_messages (user_id, role, content, created_at)
                VALUES (?1, ?2, ?3, ?4)
                RETURNING id, user_id, role, content, created_at
            ",
        )
        .bind(user_id_to_i64(message.user_id)?)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_message_row(&row)
    }

    async fn history(&self, user_id: UserId) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, role, content, created_at
                FROM chat_messages
                WHERE user_id = ?1
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_message_row).collect()
    }
}

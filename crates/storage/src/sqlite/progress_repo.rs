use async_trait::async_trait;
use claim_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{conn, encode_tasks, map_progress_row, user_id_to_i64};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, current_step, completed_tasks, updated_at
                FROM progress
                WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO progress (user_id, current_step, completed_tasks, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO UPDATE SET
                    current_step = excluded.current_step,
                    completed_tasks = excluded.completed_tasks,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_to_i64(record.user_id)?)
        .bind(i64::from(record.stage.index()))
        .bind(encode_tasks(&record.completed_tasks)?)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

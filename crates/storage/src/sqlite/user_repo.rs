use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claim_core::model::{User, UserId, ValidatedLogin};

use super::SqliteRepository;
use super::mapping::{conn, map_user_row, user_id_to_i64};
use crate::repository::{StorageError, UserRepository};

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(
        &self,
        login: &ValidatedLogin,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO users (ci, name, phone, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(ci) DO UPDATE SET
                    -- created_at stays from the first login
                    name = excluded.name,
                    phone = excluded.phone
                RETURNING id, ci, name, phone, created_at
            ",
        )
        .bind(&login.ci)
        .bind(&login.name)
        .bind(&login.phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_user_row(&row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, ci, name, phone, created_at FROM users WHERE id = ?1")
            .bind(user_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_user_row).transpose()
    }
}

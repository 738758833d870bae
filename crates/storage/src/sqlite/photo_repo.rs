use async_trait::async_trait;
use claim_core::model::{AccidentPhoto, UserId, ValidatedPhoto};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_photo_row, user_id_to_i64};
use crate::repository::{PhotoRepository, StorageError};

#[async_trait]
impl PhotoRepository for SqliteRepository {
    async fn insert_photo(
        &self,
        user_id: UserId,
        photo: &ValidatedPhoto,
    ) -> Result<AccidentPhoto, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO accident_images (
                    case_id, user_id, storage_path, file_name, file_size, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING id, case_id, user_id, storage_path, file_name, file_size, created_at
            ",
        )
        .bind(&photo.case_id)
        .bind(user_id_to_i64(user_id)?)
        .bind(&photo.storage_path)
        .bind(&photo.file_name)
        .bind(id_to_i64("file_size", photo.file_size)?)
        .bind(photo.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_photo_row(&row)
    }

    async fn photos_for_case(&self, case_id: &str) -> Result<Vec<AccidentPhoto>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, case_id, user_id, storage_path, file_name, file_size, created_at
                FROM accident_images
                WHERE case_id = ?1
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_photo_row).collect()
    }
}

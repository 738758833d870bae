use async_trait::async_trait;
use claim_core::model::{MedGuaranteeRequest, UserId, ValidatedMedGuarantee};

use super::SqliteRepository;
use super::mapping::{conn, map_guarantee_row, user_id_to_i64};
use crate::repository::{MedGuaranteeRepository, StorageError};

#[async_trait]
impl MedGuaranteeRepository for SqliteRepository {
    async fn insert_request(
        &self,
        user_id: UserId,
        request: &ValidatedMedGuarantee,
    ) -> Result<MedGuaranteeRequest, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO med_guarantee_requests (
                    user_id, treatment_method, hospital_name, phone_number, fax_number, requested_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING
                    id, user_id, treatment_method, hospital_name, phone_number, fax_number,
                    requested_at
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(request.treatment_method.as_str())
        .bind(&request.hospital_name)
        .bind(request.phone_number.as_deref())
        .bind(&request.fax_number)
        .bind(request.requested_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_guarantee_row(&row)
    }
}

use async_trait::async_trait;
use claim_core::model::{Claim, ClaimId, UserId, ValidatedClaim};

use super::SqliteRepository;
use super::mapping::{conn, map_claim_row, ser, user_id_to_i64};
use crate::repository::{ClaimRepository, StorageError};

#[async_trait]
impl ClaimRepository for SqliteRepository {
    async fn insert_claim(
        &self,
        user_id: UserId,
        claim: &ValidatedClaim,
    ) -> Result<Claim, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO insurance_claims (
                    user_id, name, rrn_front, rrn_back, address, job,
                    accident_date, accident_location, accident_type, accident_desc,
                    injury_part, hospital_name, hospital_location, treatment_type,
                    first_visit_date, case_number, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(&claim.name)
        .bind(&claim.rrn_front)
        .bind(&claim.rrn_back)
        .bind(&claim.address)
        .bind(&claim.job)
        .bind(claim.accident_date)
        .bind(&claim.accident_location)
        .bind(&claim.accident_type)
        .bind(&claim.accident_desc)
        .bind(&claim.injury_part)
        .bind(&claim.hospital_name)
        .bind(&claim.hospital_location)
        .bind(claim.treatment_type.as_str())
        .bind(claim.first_visit_date)
        .bind(claim.case_number.as_deref())
        .bind(claim.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(claim.clone().assign_id(ClaimId::new(id), user_id))
    }

    async fn latest_claim(&self, user_id: UserId) -> Result<Option<Claim>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, user_id, name, address, job,
                    accident_date, accident_location, accident_type, accident_desc,
                    injury_part, hospital_name, hospital_location, treatment_type,
                    first_visit_date, case_number, created_at
                FROM insurance_claims
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_claim_row).transpose()
    }
}

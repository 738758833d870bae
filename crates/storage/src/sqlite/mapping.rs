use chrono::{DateTime, NaiveDate, Utc};
use claim_core::model::{
    AccidentPhoto, ChatMessage, ChatRole, Claim, ClaimId, CompletedTasks, GuaranteeId,
    MedGuaranteeRequest, MessageId, PhotoId, Stage, TreatmentType, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ProgressRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    id_to_i64("user_id", id.value())
}

fn user_id_from_row(row: &SqliteRow, column: &'static str) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64(
        column,
        row.try_get::<i64, _>(column).map_err(ser)?,
    )?))
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

pub(crate) fn stage_from_i64(v: i64) -> Result<Stage, StorageError> {
    let index = u8::try_from(v).map_err(|_| ser(format!("stage out of range: {v}")))?;
    Stage::from_index(index).map_err(ser)
}

/// Tasks are stored as a JSON array of their literal ids.
pub(crate) fn encode_tasks(tasks: &CompletedTasks) -> Result<String, StorageError> {
    serde_json::to_string(tasks).map_err(ser)
}

pub(crate) fn decode_tasks(raw: &str) -> Result<CompletedTasks, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let raw_tasks: String = row.try_get("completed_tasks").map_err(ser)?;
    Ok(ProgressRecord {
        user_id: user_id_from_row(row, "user_id")?,
        stage: stage_from_i64(row.try_get::<i64, _>("current_step").map_err(ser)?)?,
        completed_tasks: decode_tasks(&raw_tasks)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

//
// ─── ACCOUNTS AND FORMS ────────────────────────────────────────────────────────
//

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: user_id_from_row(row, "id")?,
        ci: row.try_get("ci").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        phone: row.try_get("phone").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

fn treatment_from_row(row: &SqliteRow, column: &'static str) -> Result<TreatmentType, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    TreatmentType::parse(&raw).ok_or_else(|| ser(format!("invalid {column}: {raw}")))
}

pub(crate) fn map_claim_row(row: &SqliteRow) -> Result<Claim, StorageError> {
    let accident_date: DateTime<Utc> = row.try_get("accident_date").map_err(ser)?;
    let first_visit_date: NaiveDate = row.try_get("first_visit_date").map_err(ser)?;
    Ok(Claim {
        id: ClaimId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_row(row, "user_id")?,
        name: row.try_get("name").map_err(ser)?,
        address: row.try_get("address").map_err(ser)?,
        job: row.try_get("job").map_err(ser)?,
        accident_date,
        accident_location: row.try_get("accident_location").map_err(ser)?,
        accident_type: row.try_get("accident_type").map_err(ser)?,
        accident_desc: row.try_get("accident_desc").map_err(ser)?,
        injury_part: row.try_get("injury_part").map_err(ser)?,
        hospital_name: row.try_get("hospital_name").map_err(ser)?,
        hospital_location: row.try_get("hospital_location").map_err(ser)?,
        treatment_type: treatment_from_row(row, "treatment_type")?,
        first_visit_date,
        case_number: row.try_get("case_number").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_guarantee_row(row: &SqliteRow) -> Result<MedGuaranteeRequest, StorageError> {
    Ok(MedGuaranteeRequest {
        id: GuaranteeId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_row(row, "user_id")?,
        treatment_method: treatment_from_row(row, "treatment_method")?,
        hospital_name: row.try_get("hospital_name").map_err(ser)?,
        phone_number: row.try_get("phone_number").map_err(ser)?,
        fax_number: row.try_get("fax_number").map_err(ser)?,
        requested_at: row.try_get("requested_at").map_err(ser)?,
    })
}

pub(crate) fn map_photo_row(row: &SqliteRow) -> Result<AccidentPhoto, StorageError> {
    Ok(AccidentPhoto {
        id: PhotoId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_row(row, "user_id")?,
        case_id: row.try_get("case_id").map_err(ser)?,
        storage_path: row.try_get("storage_path").map_err(ser)?,
        file_name: row.try_get("file_name").map_err(ser)?,
        file_size: i64_to_u64("file_size", row.try_get("file_size").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_message_row(row: &SqliteRow) -> Result<ChatMessage, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    Ok(ChatMessage {
        id: MessageId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        user_id: user_id_from_row(row, "user_id")?,
        role: ChatRole::parse(&role).ok_or_else(|| ser(format!("invalid role: {role}")))?,
        content: row.try_get("content").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{PhotoId, UserId};

/// Metadata for a file the client already put in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDraft {
    pub case_id: String,
    pub storage_path: String,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PhotoError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("file size must be greater than zero")]
    EmptyFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPhoto {
    pub case_id: String,
    pub storage_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl PhotoDraft {
    /// # Errors
    ///
    /// Returns `PhotoError` for blank identifiers or a zero-byte file.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedPhoto, PhotoError> {
        let case_id = non_empty("caseId", &self.case_id)?;
        let storage_path = non_empty("storagePath", &self.storage_path)?;
        let file_name = non_empty("fileName", &self.file_name)?;
        if self.file_size == 0 {
            return Err(PhotoError::EmptyFile);
        }
        Ok(ValidatedPhoto {
            case_id,
            storage_path,
            file_name,
            file_size: self.file_size,
            created_at: now,
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, PhotoError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PhotoError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// A registered accident photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentPhoto {
    pub id: PhotoId,
    pub user_id: UserId,
    pub case_id: String,
    pub storage_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl ValidatedPhoto {
    #[must_use]
    pub fn assign_id(self, id: PhotoId, user_id: UserId) -> AccidentPhoto {
        AccidentPhoto {
            id,
            user_id,
            case_id: self.case_id,
            storage_path: self.storage_path,
            file_name: self.file_name,
            file_size: self.file_size,
            created_at: self.created_at,
        }
    }
}

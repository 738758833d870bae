use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

/// Phone-verification result handed to login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginDraft {
    pub name: String,
    pub phone: String,
    /// Linked identity key from the verification provider.
    #[serde(default)]
    pub ci: Option<String>,
}

/// Validated login details. `phone` holds digits only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLogin {
    pub name: String,
    pub phone: String,
    pub ci: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoginError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("phone number must have 10 or 11 digits")]
    InvalidPhone,

    #[error("identity key cannot be empty")]
    EmptyCi,
}

impl LoginDraft {
    /// Validate the draft, generating a placeholder identity key when none was given.
    ///
    /// # Errors
    ///
    /// Returns `LoginError` if the name is blank, the phone is not 10–11 digits,
    /// or an explicit identity key is blank.
    pub fn validate(self) -> Result<ValidatedLogin, LoginError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LoginError::EmptyName);
        }

        let phone = normalize_phone(&self.phone).ok_or(LoginError::InvalidPhone)?;

        let ci = match self.ci {
            Some(ci) => {
                let ci = ci.trim();
                if ci.is_empty() {
                    return Err(LoginError::EmptyCi);
                }
                ci.to_string()
            }
            None => format!("mock-ci-{}", uuid::Uuid::new_v4()),
        };

        Ok(ValidatedLogin {
            name: name.to_string(),
            phone,
            ci,
        })
    }
}

/// Strip separators and accept 10–11 digit numbers.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            '-' | ' ' => {}
            _ => return None,
        }
    }
    (10..=11).contains(&digits.len()).then_some(digits)
}

/// A stored claimant account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub ci: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Who an authenticated request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(rename = "userId")]
    pub id: UserId,
    pub name: String,
    pub phone: String,
}

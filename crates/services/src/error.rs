//! Shared error types for the services crate.

use thiserror::Error;

use claim_core::model::{ChatError, ClaimValidationError, LoginError, PhotoError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("progress reset is disabled")]
    ResetDisabled,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the claim and med-guarantee services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClaimServiceError {
    #[error("login required")]
    Unauthenticated,
    #[error(transparent)]
    Validation(#[from] ClaimValidationError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PhotoService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PhotoServiceError {
    #[error("login required")]
    Unauthenticated,
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatServiceError {
    #[error("chat proxy is not configured")]
    Disabled,
    #[error("chat webhook url is invalid: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("chat webhook returned an empty response")]
    EmptyResponse,
    #[error("chat webhook failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("login required")]
    Unauthenticated,
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Chat(#[from] ChatServiceError),
}

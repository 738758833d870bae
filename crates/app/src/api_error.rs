use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use claim_core::model::FieldError;
use serde_json::json;
use services::{
    AuthError, ChatServiceError, ClaimServiceError, DashboardError, PhotoServiceError,
    ProgressServiceError,
};

/// Service failures mapped onto HTTP statuses with a JSON `{"error": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Forbidden(String),
    NotFound(String),
    Invalid(String),
    Fields(Vec<FieldError>),
    Unavailable(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "login required"}),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({"error": msg})),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"error": msg})),
            ApiError::Invalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, json!({"error": msg})),
            ApiError::Fields(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({"error": "invalid form", "fields": fields}),
            ),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, json!({"error": msg})),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, json!({"error": msg})),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "internal error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::ResetDisabled => ApiError::Forbidden(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Login(login) => ApiError::Invalid(login.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ClaimServiceError> for ApiError {
    fn from(err: ClaimServiceError) -> Self {
        match err {
            ClaimServiceError::Unauthenticated => ApiError::Unauthenticated,
            ClaimServiceError::Validation(invalid) => ApiError::Fields(invalid.fields().to_vec()),
            ClaimServiceError::Progress(progress) => progress.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PhotoServiceError> for ApiError {
    fn from(err: PhotoServiceError) -> Self {
        match err {
            PhotoServiceError::Unauthenticated => ApiError::Unauthenticated,
            PhotoServiceError::Photo(photo) => ApiError::Invalid(photo.to_string()),
            PhotoServiceError::Progress(progress) => progress.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::Chat(chat) => ApiError::Invalid(chat.to_string()),
            ChatServiceError::Disabled => ApiError::Unavailable(err.to_string()),
            ChatServiceError::HttpStatus(_)
            | ChatServiceError::Http(_)
            | ChatServiceError::EmptyResponse => ApiError::Upstream(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Unauthenticated => ApiError::Unauthenticated,
            DashboardError::Progress(progress) => progress.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let cases = [
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ApiError::from(ProgressServiceError::ResetDisabled), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Fields(Vec::new()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(ChatServiceError::Disabled), StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::from(ClaimServiceError::Unauthenticated),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

use axum::extract::{FromRequestParts, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, async_trait, middleware};
use claim_core::model::{
    AccidentPhoto, ChatMessage, Claim, ClaimDraft, LoginDraft, MedGuaranteeDraft,
    MedGuaranteeRequest, PhotoDraft, TaskId, UserIdentity,
};
use serde::{Deserialize, Serialize};
use services::{
    AppServices, ChatReply, DashboardView, ProgressSnapshot, SessionInfo, SessionState,
};
use std::convert::Infallible;

use crate::api_error::ApiError;
use crate::cookies::{CookiePolicy, session_token};
use crate::middleware::{reentry_guard, request_tracing};

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub cookies: CookiePolicy,
}

/// Build the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/dashboard", get(dashboard))
        // Auth
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        // API
        .route("/api/session", get(session_info))
        .route("/api/progress", get(progress))
        .route("/api/progress/tasks/:task", post(complete_task))
        .route("/api/progress/reset", post(reset_progress))
        .route("/api/claims", post(submit_claim))
        .route("/api/claims/latest", get(latest_claim))
        .route("/api/med-guarantee", post(request_guarantee))
        .route("/api/photos", post(register_photo))
        .route("/api/photos/:case_id", get(list_photos))
        .route("/api/chat", post(send_chat))
        .route("/api/chat/history", get(chat_history))
        // Health check
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), reentry_guard))
        .layer(middleware::from_fn(request_tracing))
        .with_state(state)
}

/// Session resolved from the `auth_session` cookie; anonymous when absent or expired.
pub struct CurrentSession(pub SessionState);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        Ok(Self(state.services.auth().resolve(token.as_deref()).await))
    }
}

async fn health() -> impl IntoResponse {
    "OK"
}

//
// ─── AUTH ──────────────────────────────────────────────────────────────────────
//

async fn login(
    State(state): State<AppState>,
    Json(draft): Json<LoginDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.services.auth().login(draft).await?;
    let cookie = state.cookies.issue(outcome.token.as_str());
    Ok(([(SET_COOKIE, cookie)], Json::<UserIdentity>(outcome.identity)))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        if let Some(user_id) = state.services.auth().logout(&token).await {
            state.services.progress().forget(user_id).await;
        }
    }
    (StatusCode::NO_CONTENT, [(SET_COOKIE, state.cookies.clear())])
}

async fn session_info(CurrentSession(session): CurrentSession) -> Json<SessionInfo> {
    Json(session.info())
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteTaskResponse {
    changed: bool,
    #[serde(flatten)]
    snapshot: ProgressSnapshot,
}

async fn progress(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.services.progress().snapshot(&session).await?))
}

async fn complete_task(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(task): Path<String>,
) -> Result<Json<CompleteTaskResponse>, ApiError> {
    let task: TaskId = task
        .parse()
        .map_err(|err: claim_core::model::ProgressError| ApiError::NotFound(err.to_string()))?;
    let outcome = state
        .services
        .progress()
        .complete_task(&session, task)
        .await?;
    Ok(Json(CompleteTaskResponse {
        changed: outcome.completion.changed(),
        snapshot: outcome.snapshot,
    }))
}

async fn reset_progress(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    if !session.is_logged_in() {
        return Err(ApiError::Unauthenticated);
    }
    Ok(Json(state.services.progress().reset(&session).await?))
}

//
// ─── FORMS ─────────────────────────────────────────────────────────────────────
//

async fn submit_claim(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(draft): Json<ClaimDraft>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    let claim = state.services.claims().submit(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn latest_claim(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Option<Claim>>, ApiError> {
    Ok(Json(state.services.claims().latest(&session).await?))
}

async fn request_guarantee(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(draft): Json<MedGuaranteeDraft>,
) -> Result<(StatusCode, Json<MedGuaranteeRequest>), ApiError> {
    let request = state
        .services
        .med_guarantee()
        .request(&session, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn register_photo(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(draft): Json<PhotoDraft>,
) -> Result<(StatusCode, Json<AccidentPhoto>), ApiError> {
    let photo = state.services.photos().register(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

async fn list_photos(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<AccidentPhoto>>, ApiError> {
    Ok(Json(state.services.photos().list(&session, &case_id).await?))
}

//
// ─── CHAT ──────────────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn send_chat(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    Ok(Json(
        state
            .services
            .chat()
            .send(&session, &request.message)
            .await?,
    ))
}

async fn chat_history(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.services.chat().history(&session).await?))
}

//
// ─── DASHBOARD ─────────────────────────────────────────────────────────────────
//

async fn dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(state.services.dashboard().view(&session).await?))
}

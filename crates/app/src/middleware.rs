use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{HOST, REFERER, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use crate::api_error::ApiError;
use crate::cookies::session_token;
use crate::routes::AppState;

/// Wraps each request in an `http.request` span and tags the response with its id.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
    });
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Paths exempt from the re-entry guard: auth, API, and static files.
fn is_page_route(path: &str) -> bool {
    !(path == "/auth"
        || path.starts_with("/auth/")
        || path.starts_with("/api")
        || path == "/health"
        || path.contains('.'))
}

/// A navigation arriving from another site while carrying a session cookie.
fn is_external_entry(headers: &HeaderMap) -> bool {
    match (header_str(headers, &REFERER), header_str(headers, &HOST)) {
        (Some(referer), Some(host)) => !referer.contains(host),
        _ => false,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Ends the session of page requests entering from an external referrer.
pub async fn reentry_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_page_route(request.uri().path()) || !is_external_entry(request.headers()) {
        return next.run(request).await;
    }
    let Some(token) = session_token(request.headers()) else {
        return next.run(request).await;
    };

    if let Some(user_id) = state.services.auth().logout(&token).await {
        state.services.progress().forget(user_id).await;
    }
    tracing::info!(path = %request.uri().path(), "external entry; session invalidated");

    let mut response = ApiError::Unauthenticated.into_response();
    if let Ok(value) = HeaderValue::from_str(&state.cookies.clear()) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

//! HTTP middleware: bearer-token session resolution.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use elvtrace_core::Session;

use super::state::AppState;

/// The caller as resolved from the `Authorization` header. Handlers read it
/// as an extension; `session` is `None` for anonymous (guest) requests.
#[derive(Debug, Clone, Default)]
pub(crate) struct CurrentSession {
    pub(crate) session: Option<Session>,
    pub(crate) token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Routes where an unknown token degrades to a guest request: the health
/// check, login, and the two public scan entry points.
fn stale_token_tolerated(method: &Method, path: &str) -> bool {
    matches!(
        (method, path),
        (_, "/health") | (&Method::POST, "/session") | (&Method::GET, "/") | (&Method::POST, "/scan")
    )
}

/// Session middleware.
///
/// No `Authorization` header means a guest request. A token that does not
/// name a live session is rejected with 401, except where
/// [`stale_token_tolerated`] lets the request through as a guest.
pub(crate) async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers());
    let exempt = stale_token_tolerated(request.method(), request.uri().path());

    let session = match &token {
        None => None,
        Some(t) => match state.sessions.get(t) {
            Some(session) => Some(session),
            None if exempt => None,
            None => {
                return super::json_error(StatusCode::UNAUTHORIZED, "invalid or expired session token")
                    .into_response()
            }
        },
    };

    request
        .extensions_mut()
        .insert(CurrentSession { session, token });
    next.run(request).await
}

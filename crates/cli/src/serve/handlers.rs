//! HTTP route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use elvtrace_codegen::ScanLink;
use elvtrace_core::{NewBatch, StageEntry};
use elvtrace_export::ExportFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::middleware::CurrentSession;
use super::state::AppState;
use super::{error_response, json_error, run};
use crate::service::{build_filter, ServiceError, SessionInfo};

fn bad_body(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, &rejection.body_text()).into_response()
}

/// Header carrying storage advisories on binary downloads, as a JSON array.
pub(crate) const WARNINGS_HEADER: &str = "x-storage-warnings";

fn download(mime: &str, file_name: &str, bytes: Vec<u8>, warnings: Vec<String>) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response();
    if !warnings.is_empty() {
        match HeaderValue::from_str(&json!(warnings).to_string()) {
            Ok(value) => {
                response.headers_mut().insert(WARNINGS_HEADER, value);
            }
            Err(_) => tracing::warn!(?warnings, "advisories not representable as a header"),
        }
    }
    response
}

/// Serialize `value` and attach `warnings` next to its own fields.
fn with_warnings<T: Serialize>(value: &T, warnings: Vec<String>) -> Json<Value> {
    let mut body = serde_json::to_value(value).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut body {
        map.insert("warnings".to_string(), json!(warnings));
    }
    Json(body)
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

/// POST /session
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(login) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let (session, warnings) =
        match run(&state, move |svc| svc.login(&login.username, &login.password)).await {
            Ok(done) => done,
            Err(e) => return error_response(e),
        };
    let info = SessionInfo::from(&session);
    match state.sessions.issue(session) {
        Some(token) => (
            StatusCode::OK,
            Json(json!({ "token": token, "session": info, "warnings": warnings })),
        )
            .into_response(),
        None => error_response(ServiceError::Internal("session registry unavailable".to_string())),
    }
}

/// DELETE /session
pub(crate) async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    match current.token {
        Some(token) if state.sessions.revoke(&token) => {
            (StatusCode::OK, Json(json!({ "status": "logged out" }))).into_response()
        }
        _ => json_error(StatusCode::UNAUTHORIZED, "not logged in").into_response(),
    }
}

// ── Scan ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct LandingParams {
    code: Option<String>,
    action: Option<String>,
}

/// GET /
///
/// With `?code=<code>&action=scan` this is the label's landing: batch
/// details and timeline, no login needed. Otherwise it reports the caller.
pub(crate) async fn handle_root(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Query(params): Query<LandingParams>,
) -> Response {
    let link = ScanLink::from_query(params.code.as_deref(), params.action.as_deref());
    match link {
        Some(link) => {
            let session = current.session;
            match run(&state, move |svc| svc.scan(session.as_ref(), &link.batch_code)).await {
                Ok((view, warnings)) => {
                    (StatusCode::OK, Json(json!({ "scan": view, "warnings": warnings }))).into_response()
                }
                Err(e) => error_response(e),
            }
        }
        None => {
            let info = current.session.as_ref().map(SessionInfo::from);
            (StatusCode::OK, Json(json!({ "session": info }))).into_response()
        }
    }
}

/// POST /scan
pub(crate) async fn handle_submit_stage(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    payload: Result<Json<StageEntry>, JsonRejection>,
) -> Response {
    let Json(entry) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let session = current.session;
    match run(&state, move |svc| svc.submit_stage(session.as_ref(), entry)).await {
        Ok((record, warnings)) => (
            StatusCode::CREATED,
            Json(json!({ "record": record, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ── Labels ───────────────────────────────────────────────────────────────────

/// POST /batches
pub(crate) async fn handle_create_batch(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    payload: Result<Json<NewBatch>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let session = current.session;
    match run(&state, move |svc| svc.create_batch(session.as_ref(), request)).await {
        Ok((created, warnings)) => {
            let png = base64::engine::general_purpose::STANDARD.encode(&created.label.png);
            (
                StatusCode::CREATED,
                Json(json!({
                    "record": created.record,
                    "scan_url": created.label.url,
                    "label_png_base64": png,
                    "warnings": warnings,
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /batches
pub(crate) async fn handle_list_batches(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.list_batches(session.as_ref())).await {
        Ok((batches, warnings)) => (
            StatusCode::OK,
            Json(json!({ "batches": batches, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /batches/{code}/label
pub(crate) async fn handle_batch_label(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Path(code): Path<String>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.batch_label(session.as_ref(), &code)).await {
        Ok((label, warnings)) => download(
            "image/png",
            &format!("{}.png", label.batch_code),
            label.png,
            warnings,
        ),
        Err(e) => error_response(e),
    }
}

/// GET /batches/{code}/history
pub(crate) async fn handle_batch_history(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Path(code): Path<String>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.history(session.as_ref(), &code)).await {
        Ok((history, warnings)) => (
            StatusCode::OK,
            Json(json!({ "history": history, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /labels
pub(crate) async fn handle_label_bundle(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.label_bundle(session.as_ref())).await {
        Ok(((file_name, bytes), warnings)) => download("application/zip", &file_name, bytes, warnings),
        Err(e) => error_response(e),
    }
}

// ── Query ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecordParams {
    batch_code: Option<String>,
    /// Comma-separated stage names.
    stages: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// GET /records
pub(crate) async fn handle_records(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Query(params): Query<RecordParams>,
) -> Response {
    let filter = match build_filter(
        params.batch_code.as_deref(),
        params.stages.as_deref(),
        params.from.as_deref(),
        params.to.as_deref(),
    ) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };
    let session = current.session;
    match run(&state, move |svc| svc.query(session.as_ref(), &filter)).await {
        Ok((records, warnings)) => (
            StatusCode::OK,
            Json(json!({ "count": records.len(), "records": records, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /stats
pub(crate) async fn handle_stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.stats(session.as_ref())).await {
        Ok((stats, warnings)) => (StatusCode::OK, with_warnings(&stats, warnings)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportParams {
    format: Option<String>,
    /// Comma-separated batch codes; absent exports everything.
    codes: Option<String>,
}

/// GET /export
pub(crate) async fn handle_export(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Query(params): Query<ExportParams>,
) -> Response {
    let format = match params.format.as_deref().unwrap_or("csv").parse::<ExportFormat>() {
        Ok(f) => f,
        Err(e) => return error_response(ServiceError::Export(e)),
    };
    let codes: Vec<String> = params
        .codes
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    let session = current.session;
    match run(&state, move |svc| svc.export(session.as_ref(), format, &codes)).await {
        Ok((artifact, warnings)) => {
            download(artifact.mime, &artifact.file_name, artifact.bytes, warnings)
        }
        Err(e) => error_response(e),
    }
}

// ── Admin ────────────────────────────────────────────────────────────────────

/// GET /admin/storage
pub(crate) async fn handle_storage_info(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.storage_info(session.as_ref())).await {
        Ok((info, warnings)) => (StatusCode::OK, with_warnings(&info, warnings)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /admin/sync
pub(crate) async fn handle_sync(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.sync_to_remote(session.as_ref())).await {
        Ok((rows, warnings)) => (
            StatusCode::OK,
            Json(json!({ "synced_rows": rows, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /admin/clear
pub(crate) async fn handle_clear(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.clear(session.as_ref())).await {
        Ok(((), warnings)) => (
            StatusCode::OK,
            Json(json!({ "status": "cleared", "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /admin/import
///
/// Body is a delimited-text table in the export layout. Replaces the table.
pub(crate) async fn handle_import(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    body: Bytes,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.import(session.as_ref(), &body)).await {
        Ok((rows, warnings)) => (
            StatusCode::OK,
            Json(json!({ "imported_rows": rows, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /admin/backup
pub(crate) async fn handle_backup(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.backup(session.as_ref())).await {
        Ok((artifact, warnings)) => {
            download(artifact.mime, &artifact.file_name, artifact.bytes, warnings)
        }
        Err(e) => error_response(e),
    }
}

/// POST /admin/reinitialize
pub(crate) async fn handle_reinitialize(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.reinitialize(session.as_ref())).await {
        Ok((info, warnings)) => (
            StatusCode::OK,
            Json(json!({ "storage": info, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /admin/accounts
pub(crate) async fn handle_accounts(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.accounts(session.as_ref())).await {
        Ok((accounts, warnings)) => (
            StatusCode::OK,
            Json(json!({ "accounts": accounts, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /admin/seed-demo
pub(crate) async fn handle_seed_demo(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    let session = current.session;
    match run(&state, move |svc| svc.seed_demo(session.as_ref())).await {
        Ok((rows, warnings)) => (
            StatusCode::OK,
            Json(json!({ "seeded_rows": rows, "warnings": warnings })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

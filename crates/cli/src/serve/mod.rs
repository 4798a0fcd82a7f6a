//! `elvtrace serve` -- HTTP JSON API over the trace table.
//!
//! Exposes the record store, label generation, queries and export as an
//! async HTTP service using `axum` + `tokio`. Storage work runs on the
//! blocking pool; calls into the store are serialized.
//!
//! Callers log in with `POST /session` and send the returned token as
//! `Authorization: Bearer <token>`. Requests without a token act as a
//! guest, which may only scan.
//!
//! Endpoints:
//! - GET    /health                   - Server status
//! - POST   /session                  - Log in, returns a bearer token
//! - DELETE /session                  - Log out
//! - GET    /                         - Scan view for `?code=..&action=scan`, else the caller
//! - POST   /scan                     - Submit a stage event (guest allowed)
//! - POST   /batches                  - Open a batch and render its label
//! - GET    /batches                  - Batches with a creation record
//! - GET    /batches/{code}/label     - Label PNG
//! - GET    /batches/{code}/history   - Batch timeline
//! - GET    /labels                   - ZIP of every label
//! - GET    /records                  - Filtered records, newest first
//! - GET    /stats                    - Summary and per-batch completeness
//! - GET    /export                   - CSV or XLSX download
//! - GET    /admin/storage            - Backend status
//! - POST   /admin/sync               - Push the local table to the remote
//! - POST   /admin/clear              - Empty the table
//! - POST   /admin/import             - Replace the table from a CSV body
//! - GET    /admin/backup             - Local file as CSV
//! - POST   /admin/reinitialize       - Reconnect storage
//! - GET    /admin/accounts           - Account list
//! - POST   /admin/seed-demo          - Demo batches into an empty table
//!
//! JSON responses use Content-Type: application/json. Write endpoints add
//! a `warnings` array carrying storage advisories.

mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use elvtrace_core::{AccessError, ValidationError};
use elvtrace_export::ExportError;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::*;
use self::middleware::session_middleware;
use self::state::{AppState, SessionRegistry};
use crate::config::Config;
use crate::service::{ServiceError, TraceService};

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(ValidationError::UnknownBatch(_)) | ServiceError::UnknownBatch(_) => {
            StatusCode::NOT_FOUND
        }
        ServiceError::Validation(_) | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::Export(ExportError::Workbook(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Export(_) => StatusCode::BAD_REQUEST,
        ServiceError::InvalidCredentials | ServiceError::Access(AccessError::Unauthenticated(_)) => {
            StatusCode::UNAUTHORIZED
        }
        ServiceError::Access(AccessError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        ServiceError::Storage(_) | ServiceError::Codegen(_) | ServiceError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: ServiceError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    json_error(status, &err.to_string()).into_response()
}

/// Run `f` against the service on the blocking pool. Returns its value and
/// the storage advisories raised while it ran.
async fn run<T, F>(state: &Arc<AppState>, f: F) -> Result<(T, Vec<String>), ServiceError>
where
    T: Send + 'static,
    F: FnOnce(&mut TraceService) -> Result<T, ServiceError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        let mut service = state
            .service
            .lock()
            .map_err(|_| ServiceError::Internal("service lock poisoned".to_string()))?;
        let result = f(&mut service);
        let warnings = service.drain_advisories();
        result.map(|value| (value, warnings))
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("task failed: {}", e)))?
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/session", post(handle_login).delete(handle_logout))
        .route("/", get(handle_root))
        .route("/scan", post(handle_submit_stage))
        .route("/batches", get(handle_list_batches).post(handle_create_batch))
        .route("/batches/{code}/label", get(handle_batch_label))
        .route("/batches/{code}/history", get(handle_batch_history))
        .route("/labels", get(handle_label_bundle))
        .route("/records", get(handle_records))
        .route("/stats", get(handle_stats))
        .route("/export", get(handle_export))
        .route("/admin/storage", get(handle_storage_info))
        .route("/admin/sync", post(handle_sync))
        .route("/admin/clear", post(handle_clear))
        .route("/admin/import", post(handle_import))
        .route("/admin/backup", get(handle_backup))
        .route("/admin/reinitialize", post(handle_reinitialize))
        .route("/admin/accounts", get(handle_accounts))
        .route("/admin/seed-demo", post(handle_seed_demo))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(
    config: Config,
    port: u16,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data_file = config.data_file.clone();
    let mut service = tokio::task::spawn_blocking(move || TraceService::open(&config)).await?;
    for advisory in service.drain_advisories() {
        eprintln!("Warning: {}", advisory);
    }
    let info = service.storage_info_unchecked();
    eprintln!(
        "Storage: {} (local file {})",
        if info.remote_available { "remote table" } else { "local file" },
        data_file.display()
    );

    let state = Arc::new(AppState {
        service: Mutex::new(service),
        sessions: SessionRegistry::new(),
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: SocketAddr = addr.parse()?;
        eprintln!("elvtrace listening on https://0.0.0.0:{}", port);
        axum_server::bind_rustls(socket_addr, config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("elvtrace listening on http://0.0.0.0:{}", port);
    tracing::info!(port, "server started");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("could not install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use elvtrace_core::{Capability, Role, Stage};
    use elvtrace_storage::StorageError;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&ServiceError::Validation(ValidationError::MissingOperator)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::Validation(ValidationError::SystemStage(Stage::Created))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServiceError::Validation(ValidationError::UnknownBatch("X".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ServiceError::Access(AccessError::Unauthenticated(Capability::Query))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&ServiceError::Access(AccessError::Forbidden {
                role: Role::Viewer,
                capability: Capability::Admin,
            })),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ServiceError::Storage(StorageError::RemoteUnavailable("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&ServiceError::Export(ExportError::UnknownFormat("pdf".into()))),
            StatusCode::BAD_REQUEST
        );
    }
}

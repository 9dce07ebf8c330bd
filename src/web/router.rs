//! Router configuration for the HTTP API.

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::handlers::{
    delete_file, download_file, get_file, get_stats, list_files, upload_file, AppState,
};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(app_state.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let file_routes = Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route("/files/stats", get(get_stats))
        .route("/files/:id", get(get_file).delete(delete_file))
        .route("/files/:id/download", get(download_file));

    Router::new()
        .nest("/api", file_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Serve blobs of the local backend under `/files`, matching the public
/// URLs it hands out.
pub fn create_blob_router(base_path: &Path) -> Router {
    Router::new().nest_service("/files", ServeDir::new(base_path))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

use crate::infra::AppState;
use admissions::error::AppError;
use admissions::workflows::applications::{
    admissions_router, AdmissionsRepository, AdmissionsServices, Notifier, ObjectStore,
};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<R, S, N>(
    services: Arc<AdmissionsServices<R, S, N>>,
) -> axum::Router
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    admissions_router(services)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/files/:bucket/*path", axum::routing::get(file_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serves stored uploads behind the public URLs handed to reviewers and notices.
pub(crate) async fn file_endpoint(
    Extension(state): Extension<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let bytes = state.store.download(&bucket, &path).await?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.to_string())],
        bytes,
    )
        .into_response())
}

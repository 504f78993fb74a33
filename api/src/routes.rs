/// API route handlers for Ripedly.
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use ripedly_shared::models::{ConnectionTestResponse, HealthResponse, TrimRequest};

use crate::error::ApiError;
use crate::executor::workspace::Artifact;
use crate::AppState;

const SERVER_NAME: &str = "axum";

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/test-connection", get(test_connection))
        .route("/api/trim", post(trim_video))
        .nest_service("/temp", ServeDir::new(&state.config.temp_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ====== PROBES ======

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    info!("Health check called");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Backend is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        yt_dlp_version: state.tool_version.read().await.clone(),
        environment: state.config.environment.clone(),
        server: SERVER_NAME.to_string(),
    })
}

/// GET /api/test-connection
pub async fn test_connection() -> Json<ConnectionTestResponse> {
    info!("Connection test called");
    Json(ConnectionTestResponse {
        status: "success".to_string(),
        message: "Frontend-Backend connection is working!".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        server_type: SERVER_NAME.to_string(),
    })
}

// ====== TRIM ======

/// POST /api/trim - run one clip job and stream the result back
pub async fn trim_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TrimRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let job_id = Uuid::new_v4();

    let Json(request) = payload.map_err(|e| {
        warn!(%job_id, "Unreadable trim body: {}", e);
        ApiError::bad_request("Missing required parameters")
    })?;

    info!(
        %job_id,
        url = %request.url,
        start = %request.start_time,
        end = %request.end_time,
        "Received trim request"
    );

    let artifact = state
        .executor
        .execute(&request)
        .instrument(info_span!("trim_job", %job_id))
        .await
        .map_err(|e| {
            warn!(%job_id, status = %e.status_code(), "Trim job failed: {}", e);
            e
        })?;

    info!(%job_id, file = %artifact.filename, bytes = artifact.size, "Sending file to client");
    Ok(artifact_response(artifact))
}

fn artifact_response(artifact: Artifact) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.filename.replace('"', "_")
    );
    let body = Body::from_stream(ReaderStream::new(artifact.reader));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
        ],
        body,
    )
        .into_response()
}

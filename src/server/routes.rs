//! Request handlers.
//!
//! Handlers only translate between HTTP and registry calls. The stream
//! route is the one exception: it owns a capture worker for as long as the
//! client stays connected.

use super::error::ApiError;
use super::AppState;
use crate::registry::{CameraStatus, SessionError};
use crate::streaming::{multipart, FrameStreamer};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>camera-streamer</title></head>
<body>
<h1>camera-streamer</h1>
<ul>
<li><code>GET /stream/available_cameras</code> idle camera names</li>
<li><code>GET /stream/cameras</code> status of every camera</li>
<li><code>GET /stream/cameras/{name}</code> status of one camera</li>
<li><code>GET /stream/start/{name}</code> MJPEG stream</li>
<li><code>GET /stream/end/{name}</code> stop a stream</li>
<li><code>POST /stream/fps/{name}?fps=N</code> set emission rate</li>
<li><code>POST /stream/encoding_quality/{name}?encoding_quality=N</code> set JPEG quality</li>
<li><code>GET /metrics</code> Prometheus metrics</li>
<li><code>GET /health</code> liveness</li>
</ul>
</body>
</html>
"#;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/stream/available_cameras", get(available_cameras))
        .route("/stream/cameras", get(camera_statuses))
        .route("/stream/cameras/:camera_name", get(camera_status))
        .route("/stream/start/:camera_name", get(start_stream))
        .route("/stream/end/:camera_name", get(end_stream))
        .route("/stream/fps/:camera_name", post(set_fps))
        .route(
            "/stream/encoding_quality/:camera_name",
            post(set_encoding_quality),
        )
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let output = state.metrics.encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
        .into_response())
}

async fn available_cameras(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list_available())
}

async fn camera_statuses(State(state): State<AppState>) -> Json<Vec<CameraStatus>> {
    Json(state.registry.statuses())
}

async fn camera_status(
    State(state): State<AppState>,
    Path(camera_name): Path<String>,
) -> Result<Json<CameraStatus>, ApiError> {
    Ok(Json(state.registry.status(&camera_name)?))
}

/// Starts a session and streams it as `multipart/x-mixed-replace`.
///
/// The device is opened and read on a dedicated thread. The open result is
/// reported back before any header is written, so a busy or missing camera
/// still gets a proper status code. Once streaming, the worker stops when
/// the session ends, the device fails, or the client goes away.
async fn start_stream(
    State(state): State<AppState>,
    Path(camera_name): Path<String>,
) -> Result<Response, ApiError> {
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), SessionError>>();
    let (chunk_tx, chunk_rx) = mpsc::channel::<Result<Vec<u8>, Infallible>>(state.channel_capacity);

    let registry = state.registry.clone();
    let encoder = state.encoder.clone();
    let pacing = state.pacing;
    let name = camera_name.clone();

    std::thread::Builder::new()
        .name(format!("stream-{camera_name}"))
        .spawn(move || {
            let handle = match registry.begin_session(&name) {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if ready_tx.send(Ok(())).is_err() {
                tracing::debug!(camera = %name, "Request dropped before streaming began");
                return;
            }

            let mut streamer = FrameStreamer::new(handle, encoder).with_pacing(pacing);
            for chunk in streamer.by_ref() {
                if chunk_tx.blocking_send(Ok(chunk)).is_err() {
                    tracing::info!(camera = %name, "Client disconnected");
                    break;
                }
            }
            tracing::debug!(
                camera = %name,
                frames = streamer.emitted(),
                reason = ?streamer.end_reason(),
                "Stream closed"
            );
        })
        .map_err(|e| ApiError::Internal(format!("failed to spawn stream worker: {e}")))?;

    ready_rx
        .await
        .map_err(|_| ApiError::Internal("stream worker exited before reporting".to_string()))??;

    let body = Body::from_stream(ReceiverStream::new(chunk_rx));
    Ok((
        [
            (header::CONTENT_TYPE, multipart::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        body,
    )
        .into_response())
}

async fn end_stream(
    State(state): State<AppState>,
    Path(camera_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.end_session(&camera_name)?;
    Ok(StatusCode::OK)
}

/// Raw query values; parsed here so malformed numbers map to `InvalidArgument`.
#[derive(Debug, Deserialize)]
struct FpsParams {
    fps: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QualityParams {
    encoding_quality: Option<String>,
}

fn integer_param(name: &str, value: Option<&str>) -> Result<i64, SessionError> {
    let value = value.ok_or_else(|| SessionError::InvalidArgument(format!("missing `{name}`")))?;
    value.trim().parse().map_err(|_| {
        SessionError::InvalidArgument(format!("`{name}` must be an integer, got {value:?}"))
    })
}

async fn set_fps(
    State(state): State<AppState>,
    Path(camera_name): Path<String>,
    Query(params): Query<FpsParams>,
) -> Result<StatusCode, ApiError> {
    // Unknown cameras are reported before malformed values
    state.registry.lookup(&camera_name)?;
    let fps = integer_param("fps", params.fps.as_deref())?;
    state.registry.set_fps(&camera_name, fps)?;
    Ok(StatusCode::OK)
}

async fn set_encoding_quality(
    State(state): State<AppState>,
    Path(camera_name): Path<String>,
    Query(params): Query<QualityParams>,
) -> Result<StatusCode, ApiError> {
    state.registry.lookup(&camera_name)?;
    let quality = integer_param("encoding_quality", params.encoding_quality.as_deref())?;
    state.registry.set_encoding_quality(&camera_name, quality)?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_param() {
        assert_eq!(integer_param("fps", Some("15")), Ok(15));
        assert_eq!(integer_param("fps", Some(" -3 ")), Ok(-3));
        assert!(matches!(
            integer_param("fps", Some("fast")),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            integer_param("fps", None),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_index_lists_stream_routes() {
        assert!(INDEX_HTML.contains("/stream/start/{name}"));
        assert!(INDEX_HTML.contains("/stream/available_cameras"));
    }
}

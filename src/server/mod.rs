//! HTTP front-end.
//!
//! Exposes the registry operations and the MJPEG stream over axum. All
//! state lives in the [`CameraRegistry`]; the server holds nothing else
//! that outlives a request.

mod error;
mod routes;

pub use error::ApiError;

use crate::config::{ServerConfig, StreamConfig};
use crate::metrics::StreamMetrics;
use crate::registry::CameraRegistry;
use crate::streaming::{FrameEncoder, PacingPolicy};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur while running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CameraRegistry>,
    pub encoder: Arc<dyn FrameEncoder>,
    pub metrics: Arc<StreamMetrics>,
    pub pacing: PacingPolicy,
    /// Encoded chunks buffered per stream.
    pub channel_capacity: usize,
}

impl AppState {
    pub fn new(
        registry: Arc<CameraRegistry>,
        encoder: Arc<dyn FrameEncoder>,
        metrics: Arc<StreamMetrics>,
        stream: &StreamConfig,
    ) -> Self {
        Self {
            registry,
            encoder,
            metrics,
            pacing: stream.pacing,
            channel_capacity: stream.channel_capacity.max(1),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState, cors_permissive: bool) -> Router {
    let app = routes::routes().with_state(state);
    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// HTTP server for the stream API.
pub struct StreamServer {
    config: ServerConfig,
    state: AppState,
}

impl StreamServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serves requests until `shutdown` resolves.
    ///
    /// On shutdown every running session is ended first, so open streams
    /// finish and the connections they hold can drain.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let registry = Arc::clone(&self.state.registry);
        let app = router(self.state, self.config.cors_permissive);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            cameras = registry.len(),
            "Stream server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let ended = registry.end_all_sessions();
                tracing::info!(ended, "Shutting down, sessions ended");
            })
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockBackend;
    use crate::discovery::StaticEnumerator;
    use crate::registry::RegistryOptions;
    use crate::streaming::JpegEncoder;

    fn state(stream: &StreamConfig) -> AppState {
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let registry = CameraRegistry::discover(
            &StaticEnumerator::mock(1),
            Arc::new(MockBackend::new()),
            RegistryOptions::default(),
        )
        .with_metrics(Arc::clone(&metrics));
        AppState::new(Arc::new(registry), Arc::new(JpegEncoder::new()), metrics, stream)
    }

    #[test]
    fn test_state_from_stream_config() {
        let stream = StreamConfig {
            pacing: PacingPolicy::Throttled,
            channel_capacity: 0,
            ..Default::default()
        };
        let state = state(&stream);
        assert_eq!(state.pacing, PacingPolicy::Throttled);
        assert_eq!(state.channel_capacity, 1);
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = ServerConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            cors_permissive: false,
        };
        let server = StreamServer::new(config, state(&StreamConfig::default()));
        assert!(server.run(async {}).await.is_ok());
    }
}

//! JSON HTTP API for Reef.
//!
//! Provides an [`HttpServer`] exposing a [`ShardManager`] over axum:
//!
//! - `GET /`: service info
//! - `GET /health`: liveness and key count
//! - `GET /kv/{key}`: read a value (404 if absent)
//! - `PUT /kv/{key}`: write a value, body `{"value": ".."}`
//! - `DELETE /kv/{key}`: delete a key (404 if absent)
//! - `GET /stats`: per-shard key counts and vnode distribution
//!
//! Errors are JSON objects of the form `{"error": .., "message": ..}`.

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use reef_engine::ShardManager;

pub use error::HttpError;

/// Shared application state for all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The shard manager serving every key operation.
    pub manager: Arc<ShardManager>,
    /// Identifier reported by `/health`.
    pub node_id: Arc<str>,
}

/// Configuration for creating an [`HttpServer`].
pub struct HttpServerConfig {
    /// The initialized shard manager to serve.
    pub manager: Arc<ShardManager>,
    /// Identifier reported by `/health`.
    pub node_id: String,
}

/// HTTP server backed by a [`ShardManager`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: HttpServerConfig) -> Self {
        let state = AppState {
            manager: config.manager,
            node_id: config.node_id.into(),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/stats", get(handlers::stats))
            .route(
                "/kv/{key}",
                get(handlers::get_value)
                    .put(handlers::put_value)
                    .delete(handlers::delete_value),
            )
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the API with graceful shutdown triggered by the given future.
    ///
    /// When `shutdown` completes, the server stops accepting new connections
    /// and waits for in-flight requests to finish.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "HTTP server listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

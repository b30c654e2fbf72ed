//! HTTP server exposing the session handlers

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::session::Assistant;
use state::AppState;

/// ChatTroupe HTTP server
pub struct ChatServer {
    state: AppState,
}

impl ChatServer {
    /// Create a server backed by Gemini
    pub fn new(config: AppConfig) -> Result<Self> {
        Ok(Self {
            state: AppState::from_config(config)?,
        })
    }

    /// Create a server around an already wired assistant
    pub fn with_assistant(config: AppConfig, assistant: Assistant) -> Self {
        Self {
            state: AppState::new(config, assistant),
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr = self.address();
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address {}: {}", addr, e)))?;

        let router = self.router();

        tracing::info!("Starting ChatTroupe server on http://{}", addr);
        tracing::info!("API documentation: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        let server = &self.state.config().server;
        format!("{}:{}", server.host, server.port)
    }
}

/// Router over `state`, with tracing, compression and optional CORS
pub fn build_router(state: AppState) -> Router {
    let server = state.config().server.clone();

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::api_routes(server.max_upload_size))
        .with_state(state)
        // Middleware layers (applied bottom to top)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

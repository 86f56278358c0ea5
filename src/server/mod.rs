//! HTTP server for the conversion service

pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::WeaverConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Conversion HTTP server
pub struct WeaverServer {
    config: WeaverConfig,
    state: AppState,
}

impl WeaverServer {
    /// Create a new server; this also starts the worker pool.
    pub fn new(config: WeaverConfig) -> Self {
        let state = AppState::new(config.clone());
        Self { config, state }
    }

    /// Build the router with all routes.
    fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::api_routes(self.config.server.max_upload_size)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Start the server.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid bind address: {e}"),
                ))
            })?;

        let router = self.build_router();

        tracing::info!("starting conversion server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .await
            .map_err(Error::Io)?;

        Ok(())
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

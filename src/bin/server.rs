//! Conversion server binary
//!
//! Run with: cargo run --bin pdfweaver-server

use pdfweaver::{server::WeaverServer, WeaverConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfweaver=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = WeaverConfig::from_env();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Workers: {}", config.conversion.worker_count);
    tracing::info!("  - Queue size: {}", config.conversion.queue_size);
    tracing::info!("  - Timeout: {}s", config.conversion.timeout_secs);
    tracing::info!("  - Converter: {}", config.conversion.athena_cmd);
    tracing::info!(
        "  - Fallback: {}",
        if config.conversion.conversion_fallback {
            "enabled"
        } else {
            "disabled"
        }
    );
    if config.conversion.conversion_fallback && config.cloudconvert.api_url.is_empty() {
        tracing::warn!("fallback enabled but CLOUDCONVERT_API_URL is not set");
    }

    // Create and start server
    let server = WeaverServer::new(config);
    tracing::info!("  - Listening on: http://{}", server.address());
    server.start().await?;

    Ok(())
}

//! Application state for the conversion server

use std::sync::Arc;
use std::time::Duration;

use crate::config::WeaverConfig;
use crate::metrics::Metrics;
use crate::processing::{init_workers, Work};
use crate::sink::{ErrorSink, LogSink};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: WeaverConfig,
    /// Submission side of the bounded work queue
    queue: async_channel::Sender<Work>,
    /// Shared HTTP client for the remote converter and secondary store
    http: reqwest::Client,
    /// Metrics registry
    metrics: Metrics,
    /// Error reporting sink
    sink: Box<dyn ErrorSink>,
}

impl AppState {
    /// Create the state and start the worker pool.
    pub fn new(config: WeaverConfig) -> Self {
        Self::with_sink(config, Box::new(LogSink))
    }

    /// Create the state with a custom error sink.
    pub fn with_sink(config: WeaverConfig, sink: Box<dyn ErrorSink>) -> Self {
        let queue = init_workers(
            config.conversion.worker_count,
            config.conversion.queue_size,
            config.conversion.timeout_secs,
        );
        tracing::info!(
            workers = config.conversion.worker_count,
            queue_size = config.conversion.queue_size,
            timeout_secs = config.conversion.timeout_secs,
            "worker pool started"
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(AppStateInner {
                config,
                queue,
                http,
                metrics: Metrics::default(),
                sink,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &WeaverConfig {
        &self.inner.config
    }

    /// Get the work queue submission side
    pub fn queue(&self) -> &async_channel::Sender<Work> {
        &self.inner.queue
    }

    /// Get the shared HTTP client
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Get the metrics registry
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Get the error sink
    pub fn sink(&self) -> &dyn ErrorSink {
        self.inner.sink.as_ref()
    }
}

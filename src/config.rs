//! Configuration for the conversion service

use serde::{Deserialize, Serialize};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaverConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Conversion pipeline configuration
    pub conversion: ConversionConfig,
    /// Remote fallback converter configuration
    pub cloudconvert: CloudConvertConfig,
    /// Secondary object store configuration
    pub secondary: SecondaryStoreConfig,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            conversion: ConversionConfig::default(),
            cloudconvert: CloudConvertConfig::default(),
            secondary: SecondaryStoreConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum upload size in bytes for /convert/by-file
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_size: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Conversion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Number of conversion workers
    pub worker_count: usize,
    /// Bounded queue capacity; producers past this wait for a free slot
    pub queue_size: usize,
    /// Per-job deadline in seconds, measured from worker pickup
    pub timeout_secs: u64,
    /// Base CLI command for the primary converter, e.g. "athenapdf -S -T 120"
    pub athena_cmd: String,
    /// Retry a failed conversion once on the remote fallback converter
    pub conversion_fallback: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().min(8),
            queue_size: 50,
            timeout_secs: 90,
            athena_cmd: "athenapdf -S -T 120".to_string(),
            conversion_fallback: false,
        }
    }
}

/// Remote fallback converter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudConvertConfig {
    /// Base URL of the remote conversion API
    pub api_url: String,
    /// API key for the remote conversion API
    pub api_key: String,
}

/// Secondary object store configuration
///
/// The secondary store receives PDF bytes via a multipart upload and
/// answers with a storage key; the retrieval URL handed back to clients
/// is `base_url/<key>`. An empty `upload_url` disables the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecondaryStoreConfig {
    /// Upload endpoint; empty disables secondary uploads
    pub upload_url: String,
    /// Upload credential passed as a form field
    pub token: String,
    /// Public prefix for retrieval URLs
    pub base_url: String,
}

impl SecondaryStoreConfig {
    /// A secondary store is configured iff it has an upload endpoint.
    pub fn is_configured(&self) -> bool {
        !self.upload_url.is_empty()
    }
}

impl WeaverConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("WEAVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = std::env::var("WEAVER_PORT") {
            if let Ok(port) = v.parse() {
                config.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("WEAVER_MAX_UPLOAD") {
            if let Ok(size) = v.parse() {
                config.server.max_upload_size = size;
            }
        }
        if let Ok(v) = std::env::var("WEAVER_WORKERS") {
            if let Ok(n) = v.parse() {
                config.conversion.worker_count = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVER_QUEUE_SIZE") {
            if let Ok(n) = v.parse() {
                config.conversion.queue_size = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVER_TIMEOUT") {
            if let Ok(n) = v.parse() {
                config.conversion.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVER_ATHENA_CMD") {
            config.conversion.athena_cmd = v;
        }
        if let Ok(v) = std::env::var("WEAVER_FALLBACK") {
            config.conversion.conversion_fallback = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("CLOUDCONVERT_API_URL") {
            config.cloudconvert.api_url = v;
        }
        if let Ok(v) = std::env::var("CLOUDCONVERT_API_KEY") {
            config.cloudconvert.api_key = v;
        }
        if let Ok(v) = std::env::var("SECONDARY_UPLOAD_URL") {
            config.secondary.upload_url = v;
        }
        if let Ok(v) = std::env::var("SECONDARY_TOKEN") {
            config.secondary.token = v;
        }
        if let Ok(v) = std::env::var("SECONDARY_BASE_URL") {
            config.secondary.base_url = v;
        }

        config
    }
}

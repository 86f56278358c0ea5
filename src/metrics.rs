//! Conversion metrics registry
//!
//! A fixed set of counters with contractual names, backed by atomics so
//! handlers and workers share one registry without locking. Counter
//! values are also mirrored to tracing for log-based collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counter identifiers; `name()` yields the wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// A conversion produced an observable success outcome
    Success,
    /// The per-job deadline fired first
    ConversionTimeout,
    /// An object store upload failed after conversion succeeded
    S3UploadError,
    /// The converter itself failed
    ConversionError,
    /// The remote fallback converter was invoked
    CloudConvert,
    /// Terminal failure after fallback was exhausted
    ConversionFailed,
    /// Request rejected: missing URL
    InvalidUrl,
    /// Request rejected: missing file
    InvalidFile,
    /// Request rejected: missing domain
    InvalidDomain,
    /// Request rejected: missing key
    InvalidKey,
}

impl Counter {
    /// Contractual metric name.
    pub fn name(self) -> &'static str {
        match self {
            Counter::Success => "success",
            Counter::ConversionTimeout => "conversion_timeout",
            Counter::S3UploadError => "s3_upload_error",
            Counter::ConversionError => "conversion_error",
            Counter::CloudConvert => "cloudconvert",
            Counter::ConversionFailed => "conversion_failed",
            Counter::InvalidUrl => "invalid_url",
            Counter::InvalidFile => "invalid_file",
            Counter::InvalidDomain => "invalid_domain",
            Counter::InvalidKey => "invalid_key",
        }
    }
}

/// Shared metrics registry
#[derive(Debug, Default)]
pub struct Metrics {
    success: AtomicU64,
    conversion_timeout: AtomicU64,
    s3_upload_error: AtomicU64,
    conversion_error: AtomicU64,
    cloudconvert: AtomicU64,
    conversion_failed: AtomicU64,
    invalid_url: AtomicU64,
    invalid_file: AtomicU64,
    invalid_domain: AtomicU64,
    invalid_key: AtomicU64,
    conversion_duration_ms: AtomicU64,
    conversions_timed: AtomicU64,
}

impl Metrics {
    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Success => &self.success,
            Counter::ConversionTimeout => &self.conversion_timeout,
            Counter::S3UploadError => &self.s3_upload_error,
            Counter::ConversionError => &self.conversion_error,
            Counter::CloudConvert => &self.cloudconvert,
            Counter::ConversionFailed => &self.conversion_failed,
            Counter::InvalidUrl => &self.invalid_url,
            Counter::InvalidFile => &self.invalid_file,
            Counter::InvalidDomain => &self.invalid_domain,
            Counter::InvalidKey => &self.invalid_key,
        }
    }

    /// Increment a counter.
    pub fn increment(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
        tracing::debug!(metric = counter.name(), "counter incremented");
    }

    /// Current value of a counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    /// Record a `conversion_duration` timing for a finished conversion.
    pub fn record_duration(&self, started: Instant, outcome: &str) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.conversion_duration_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);
        self.conversions_timed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            metric = "conversion_duration",
            duration_ms = elapsed_ms,
            outcome,
            "conversion finished"
        );
    }

    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            success: self.get(Counter::Success),
            conversion_timeout: self.get(Counter::ConversionTimeout),
            s3_upload_error: self.get(Counter::S3UploadError),
            conversion_error: self.get(Counter::ConversionError),
            cloudconvert: self.get(Counter::CloudConvert),
            conversion_failed: self.get(Counter::ConversionFailed),
            invalid_url: self.get(Counter::InvalidUrl),
            invalid_file: self.get(Counter::InvalidFile),
            invalid_domain: self.get(Counter::InvalidDomain),
            invalid_key: self.get(Counter::InvalidKey),
            conversion_duration_ms: self.conversion_duration_ms.load(Ordering::Relaxed),
            conversions_timed: self.conversions_timed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of the registry
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub success: u64,
    pub conversion_timeout: u64,
    pub s3_upload_error: u64,
    pub conversion_error: u64,
    pub cloudconvert: u64,
    pub conversion_failed: u64,
    pub invalid_url: u64,
    pub invalid_file: u64,
    pub invalid_domain: u64,
    pub invalid_key: u64,
    pub conversion_duration_ms: u64,
    pub conversions_timed: u64,
}

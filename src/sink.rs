//! Error reporting sink
//!
//! Terminal conversion errors are captured to an injected sink together
//! with the logical URI of the source. The default sink writes to the
//! tracing log; deployments wire their own reporter behind the trait.

use crate::error::Error;

/// Destination for captured conversion errors.
pub trait ErrorSink: Send + Sync {
    /// Record an error attributed to the given logical URI.
    fn capture(&self, err: &Error, uri: &str);
}

/// Sink that forwards captures to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn capture(&self, err: &Error, uri: &str) {
        tracing::error!(%uri, error = %err, "conversion error captured");
    }
}

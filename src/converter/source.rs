//! Conversion source normalization
//!
//! Incoming requests carry either a remote URL or uploaded bytes; both
//! are normalized into a [`ConversionSource`] descriptor. Uploaded bytes
//! are staged to a temp file that the request handler deletes after the
//! job reaches a terminal outcome.

use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Normalized description of what to convert.
#[derive(Debug, Clone, Default)]
pub struct ConversionSource {
    /// Remote URL, or the absolute path of a staged upload
    pub uri: String,
    /// True when `uri` points at a staged temp file
    pub is_local: bool,
    /// Input type hint, without the leading dot
    pub extension: String,
    /// "Key:Value" header forwarded to the CLI converter; empty if unused
    pub auth_header: String,
    /// Logical URI for logging and error capture: the original URL for
    /// URL-born sources, the staged path otherwise
    pub actual_uri: String,
}

impl ConversionSource {
    /// Build a source from a URL or uploaded bytes.
    ///
    /// Uploaded bytes win over a URL when both are present. The auth
    /// header is only recorded when `auth_header`, `domain`, and `key`
    /// are all supplied.
    pub async fn new(
        url: &str,
        auth_header: &str,
        key: &str,
        domain: &str,
        ext: &str,
        uploaded_bytes: Option<&[u8]>,
    ) -> Result<Self> {
        if let Some(bytes) = uploaded_bytes.filter(|b| !b.is_empty()) {
            let ext = if ext.is_empty() { "html" } else { ext };
            let path = std::env::temp_dir().join(format!("pdfweaver-{}.{}", Uuid::new_v4(), ext));
            tokio::fs::write(&path, bytes).await?;
            let uri = path.to_string_lossy().into_owned();
            tracing::debug!(path = %uri, size = bytes.len(), "staged uploaded file");
            return Ok(Self {
                uri: uri.clone(),
                is_local: true,
                extension: ext.to_string(),
                auth_header: String::new(),
                actual_uri: uri,
            });
        }

        if !url.is_empty() {
            let composed = if !auth_header.is_empty() && !domain.is_empty() && !key.is_empty() {
                format!("{key}:{auth_header}")
            } else {
                String::new()
            };
            return Ok(Self {
                uri: url.to_string(),
                is_local: false,
                extension: ext.to_string(),
                auth_header: composed,
                actual_uri: url.to_string(),
            });
        }

        Err(Error::InvalidSource)
    }

    /// Guard that removes a staged local file when dropped.
    ///
    /// No-op for URL sources. Held by the request handler so the file is
    /// gone after any terminal outcome, client disconnect included.
    pub fn cleanup_guard(&self) -> SourceCleanup {
        SourceCleanup {
            path: self.is_local.then(|| PathBuf::from(&self.uri)),
        }
    }
}

/// RAII cleanup for staged uploads.
#[derive(Debug)]
pub struct SourceCleanup {
    path: Option<PathBuf>,
}

impl Drop for SourceCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), %err, "failed to remove staged file");
            }
        }
    }
}

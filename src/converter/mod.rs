//! Converter strategies
//!
//! A converter turns a [`ConversionSource`] into PDF bytes and knows how
//! to push the result to the configured object stores. Two strategies
//! exist: the local CLI renderer (primary) and the remote conversion
//! service (fallback).

pub mod cli;
pub mod cloudconvert;
pub mod source;
pub mod upload;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

pub use cli::CliConverter;
pub use cloudconvert::{CloudConvert, CloudConvertClient};
pub use source::ConversionSource;
pub use upload::{ObjectStoreConfig, StoreUploader};

/// A conversion strategy plus its upload capabilities.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Render the source to PDF bytes, honoring the cancel channel.
    async fn convert(
        &self,
        source: &ConversionSource,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<u8>>;

    /// Push the PDF to the primary store. `Ok(false)` means the store is
    /// not configured and there was nothing to do.
    async fn upload_primary(&self, pdf: &[u8]) -> Result<bool>;

    /// Push the PDF to the secondary store. On success the returned
    /// string is the public retrieval URL.
    async fn upload_secondary(&self, pdf: &[u8]) -> Result<(bool, String)>;
}

/// Resolve once the cancel channel fires.
///
/// Both an explicit `true` and a dropped sender count as cancellation;
/// the sender side is dropped when the owning task unwinds or returns.
pub(crate) async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if *cancel.borrow_and_update() {
        return;
    }
    while cancel.changed().await.is_ok() {
        if *cancel.borrow_and_update() {
            return;
        }
    }
}

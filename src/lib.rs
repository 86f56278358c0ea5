//! pdfweaver: HTML-to-PDF conversion microservice
//!
//! Clients submit a URL or a file upload; the service renders a PDF and
//! returns either the raw bytes, a `{"status":"uploaded"}` confirmation
//! when the primary object store received the result, or a JSON envelope
//! carrying a retrieval URL from the secondary store. Conversions run on
//! a fixed pool of workers draining a bounded queue, with a one-shot
//! fallback to a remote conversion service when the local CLI fails.

pub mod config;
pub mod converter;
pub mod error;
pub mod metrics;
pub mod processing;
pub mod server;
pub mod sink;

pub use config::WeaverConfig;
pub use error::{Error, Result};

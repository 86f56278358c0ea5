//! Error types for the conversion service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Conversion service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Neither a URL nor uploaded bytes were provided
    #[error("invalid source: provide a URL or an uploaded file")]
    InvalidSource,

    /// Missing or empty conversion URL
    #[error("invalid URL provided")]
    InvalidUrl,

    /// Missing or unreadable uploaded file
    #[error("invalid file provided")]
    InvalidFile,

    /// `need_login` requested without a domain
    #[error("invalid domain provided")]
    InvalidDomain,

    /// `need_login` requested without a token key
    #[error("invalid Key provided")]
    InvalidKey,

    /// The CLI converter exited non-zero
    #[error("converter exited with status {code}: {stderr}")]
    ConverterFailure { stderr: String, code: i32 },

    /// The remote conversion service answered with a non-200 status
    #[error("remote converter returned HTTP {status}: {body}")]
    RemoteFailure { status: u16, body: String },

    /// An object store upload failed after the PDF was produced
    #[error("object store upload failed: {0}")]
    ObjectStoreFailure(String),

    /// The per-job deadline elapsed before any other outcome
    #[error("conversion timed out")]
    ConversionTimeout,

    /// The caller went away before the conversion finished
    #[error("conversion cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for errors that are rejected before a job is ever enqueued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidSource
                | Error::InvalidUrl
                | Error::InvalidFile
                | Error::InvalidDomain
                | Error::InvalidKey
        )
    }

    fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else if matches!(self, Error::ConversionTimeout) {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = match &self {
            Error::InvalidSource => "invalid_source",
            Error::InvalidUrl => "invalid_url",
            Error::InvalidFile => "invalid_file",
            Error::InvalidDomain => "invalid_domain",
            Error::InvalidKey => "invalid_key",
            Error::ConverterFailure { .. } => "converter_failure",
            Error::RemoteFailure { .. } => "remote_failure",
            Error::ObjectStoreFailure(_) => "object_store_failure",
            Error::ConversionTimeout => "conversion_timeout",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Http(_) => "http_error",
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        for err in [
            Error::InvalidSource,
            Error::InvalidUrl,
            Error::InvalidFile,
            Error::InvalidDomain,
            Error::InvalidKey,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.is_validation());
        }
    }

    #[test]
    fn timeout_maps_to_504() {
        assert_eq!(
            Error::ConversionTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn terminal_errors_map_to_500() {
        let err = Error::ConverterFailure {
            stderr: "boom".into(),
            code: 1,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_validation());
    }
}

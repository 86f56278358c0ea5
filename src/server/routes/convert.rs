//! Conversion endpoints and the dispatch/fallback loop

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::converter::{
    CliConverter, CloudConvert, CloudConvertClient, ConversionSource, Converter,
    ObjectStoreConfig, StoreUploader,
};
use crate::error::Error;
use crate::metrics::Counter;
use crate::processing::{Outcome, Work};
use crate::server::state::AppState;

/// Query parameters accepted by both conversion endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub need_login: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub key: String,
    /// Bare flag: present means aggressive content extraction
    pub aggressive: Option<String>,
    #[serde(default)]
    pub aws_region: String,
    #[serde(default)]
    pub aws_id: String,
    #[serde(default)]
    pub aws_secret: String,
    #[serde(default)]
    pub s3_bucket: String,
    #[serde(default)]
    pub s3_key: String,
    #[serde(default)]
    pub s3_acl: String,
}

impl ConvertParams {
    fn store_config(&self) -> ObjectStoreConfig {
        ObjectStoreConfig {
            region: self.aws_region.clone(),
            access_key: self.aws_id.clone(),
            access_secret: self.aws_secret.clone(),
            bucket: self.s3_bucket.clone(),
            key: self.s3_key.clone(),
            acl: self.s3_acl.clone(),
        }
    }
}

/// GET /convert/by-url - convert the document behind a URL.
pub async fn convert_by_url(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Response {
    let metrics = state.metrics();

    if params.url.is_empty() {
        metrics.increment(Counter::InvalidUrl);
        return Error::InvalidUrl.into_response();
    }
    if params.need_login == "true" {
        if params.domain.is_empty() {
            metrics.increment(Counter::InvalidDomain);
            return Error::InvalidDomain.into_response();
        }
        if params.key.is_empty() {
            metrics.increment(Counter::InvalidKey);
            return Error::InvalidKey.into_response();
        }
    }

    tracing::info!(
        url = %params.url,
        ext = %params.ext,
        need_login = %params.need_login,
        "conversion requested by URL"
    );

    let source = match ConversionSource::new(
        &params.url,
        &params.token,
        &params.key,
        &params.domain,
        &params.ext,
        None,
    )
    .await
    {
        Ok(source) => source,
        Err(err) => {
            metrics.increment(Counter::ConversionError);
            state.sink().capture(&err, &params.url);
            return err.into_response();
        }
    };

    dispatch(state, source, params).await
}

/// POST /convert/by-file - convert an uploaded document. The multipart
/// field name is `file`; store parameters arrive in the query string.
pub async fn convert_by_file(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
    mut multipart: Multipart,
) -> Response {
    let mut file_bytes: Option<Bytes> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    if let Ok(bytes) = field.bytes().await {
                        file_bytes = Some(bytes);
                    }
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }

    let Some(data) = file_bytes.filter(|bytes| !bytes.is_empty()) else {
        state.metrics().increment(Counter::InvalidFile);
        return Error::InvalidFile.into_response();
    };

    tracing::info!(size = data.len(), ext = %params.ext, "conversion requested by file");

    let source = match ConversionSource::new("", "", "", "", &params.ext, Some(&data)).await {
        Ok(source) => source,
        Err(err) => {
            state.metrics().increment(Counter::ConversionError);
            state.sink().capture(&err, "uploaded file");
            return err.into_response();
        }
    };

    dispatch(state, source, params).await
}

/// Submit the job, select the single observable outcome, and retry once
/// on the fallback converter. If the client disconnects, this future is
/// dropped and the handle's drop cancels the in-flight work.
async fn dispatch(state: AppState, source: ConversionSource, params: ConvertParams) -> Response {
    let _cleanup = source.cleanup_guard();

    let config = state.config();
    let metrics = state.metrics();
    let aggressive = params.aggressive.is_some();
    let uploader = StoreUploader::new(
        params.store_config(),
        config.secondary.clone(),
        state.http().clone(),
    );

    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        let converter: Arc<dyn Converter> = if attempts == 0 {
            Arc::new(CliConverter {
                uploader: uploader.clone(),
                cmd: config.conversion.athena_cmd.clone(),
                aggressive,
            })
        } else {
            Arc::new(CloudConvert {
                uploader: uploader.clone(),
                client: CloudConvertClient::new(
                    config.cloudconvert.api_url.clone(),
                    config.cloudconvert.api_key.clone(),
                    state.http().clone(),
                ),
            })
        };

        let mut handle = Work::submit(state.queue(), converter, source.clone());

        match handle.wait().await {
            Outcome::Uploaded => {
                metrics.record_duration(started, "uploaded");
                metrics.increment(Counter::Success);
                return (StatusCode::OK, Json(json!({"status": "uploaded"}))).into_response();
            }
            Outcome::Pdf(out) => {
                metrics.record_duration(started, "pdf");
                metrics.increment(Counter::Success);
                return (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/pdf")],
                    out,
                )
                    .into_response();
            }
            Outcome::Url(url) => {
                metrics.record_duration(started, "url");
                metrics.increment(Counter::Success);
                return (
                    StatusCode::OK,
                    Json(json!({"code": 0, "msg": "OK", "data": {"URL": url}})),
                )
                    .into_response();
            }
            Outcome::Error(err) => {
                if matches!(err, Error::Cancelled) {
                    // The caller is gone; nothing to report and nothing
                    // to count as a failure.
                    return err.into_response();
                }

                match &err {
                    Error::ConversionTimeout => metrics.increment(Counter::ConversionTimeout),
                    Error::ObjectStoreFailure(_) => {
                        metrics.increment(Counter::S3UploadError);
                        state.sink().capture(&err, &source.actual_uri);
                    }
                    _ => {
                        metrics.increment(Counter::ConversionError);
                        state.sink().capture(&err, &source.actual_uri);
                    }
                }

                // Upload failures are not conversion failures: the PDF
                // exists, so re-rendering it elsewhere cannot help.
                let fallback_eligible = !matches!(err, Error::ObjectStoreFailure(_));
                if attempts == 0 && fallback_eligible && config.conversion.conversion_fallback {
                    metrics.increment(Counter::CloudConvert);
                    tracing::warn!(
                        uri = source.actual_uri,
                        error = %err,
                        "falling back to remote converter"
                    );
                    attempts = 1;
                    continue;
                }

                metrics.increment(Counter::ConversionFailed);
                return err.into_response();
            }
        }
    }
}

//! Object store uploads shared by both converter strategies
//!
//! The primary store is an S3 bucket addressed by per-request
//! credentials; the secondary store is an HTTP upload endpoint that
//! answers with a storage key used to build a retrieval URL.

use serde::Deserialize;
use uuid::Uuid;

use crate::config::SecondaryStoreConfig;
use crate::error::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ACL: &str = "public-read";
const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Primary store placement and credentials, taken from request
/// parameters. The store is configured iff bucket and key are both
/// non-empty; everything else has a default.
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreConfig {
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub bucket: String,
    pub key: String,
    pub acl: String,
}

impl ObjectStoreConfig {
    /// Uploads are skipped for unconfigured stores.
    pub fn is_configured(&self) -> bool {
        !self.bucket.is_empty() && !self.key.is_empty()
    }

    pub fn region_or_default(&self) -> &str {
        if self.region.is_empty() {
            DEFAULT_REGION
        } else {
            &self.region
        }
    }

    pub fn acl_or_default(&self) -> &str {
        if self.acl.is_empty() {
            DEFAULT_ACL
        } else {
            &self.acl
        }
    }
}

/// Upload behavior shared by both converter variants.
#[derive(Clone)]
pub struct StoreUploader {
    pub store: ObjectStoreConfig,
    secondary: SecondaryStoreConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SecondaryUploadReply {
    key: Option<String>,
}

impl StoreUploader {
    pub fn new(
        store: ObjectStoreConfig,
        secondary: SecondaryStoreConfig,
        http: reqwest::Client,
    ) -> Self {
        Self {
            store,
            secondary,
            http,
        }
    }

    /// PUT the PDF to the primary store.
    ///
    /// Returns `Ok(false)` when the store is not configured, `Ok(true)`
    /// after a successful put.
    pub async fn upload_primary(&self, pdf: &[u8]) -> Result<bool> {
        if !self.store.is_configured() {
            return Ok(false);
        }

        tracing::debug!(
            bucket = %self.store.bucket,
            key = %self.store.key,
            size = pdf.len(),
            "uploading conversion to primary store"
        );

        self.put_object(pdf).await?;
        Ok(true)
    }

    async fn put_object(&self, pdf: &[u8]) -> Result<()> {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(
                self.store.region_or_default().to_string(),
            ))
            .retry_config(
                aws_sdk_s3::config::retry::RetryConfig::standard()
                    .with_max_attempts(MAX_UPLOAD_ATTEMPTS),
            );

        if !self.store.access_key.is_empty() && !self.store.access_secret.is_empty() {
            builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                self.store.access_key.clone(),
                self.store.access_secret.clone(),
                None,
                None,
                "request-params",
            ));
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        client
            .put_object()
            .bucket(&self.store.bucket)
            .key(&self.store.key)
            .acl(aws_sdk_s3::types::ObjectCannedAcl::from(
                self.store.acl_or_default(),
            ))
            .content_type("application/pdf")
            .body(aws_sdk_s3::primitives::ByteStream::from(pdf.to_vec()))
            .send()
            .await
            .map_err(|e| Error::ObjectStoreFailure(e.to_string()))?;

        Ok(())
    }

    /// Upload the PDF to the secondary store.
    ///
    /// Returns `Ok((false, ""))` when no secondary store is configured,
    /// `Ok((true, url))` with the retrieval URL on success.
    pub async fn upload_secondary(&self, pdf: &[u8]) -> Result<(bool, String)> {
        if !self.secondary.is_configured() {
            return Ok((false, String::new()));
        }

        let object_key = format!("{}.pdf", Uuid::new_v4());
        let part = reqwest::multipart::Part::bytes(pdf.to_vec())
            .file_name(object_key.clone())
            .mime_str("application/pdf")
            .map_err(|e| Error::ObjectStoreFailure(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("token", self.secondary.token.clone())
            .text("key", object_key.clone())
            .part("file", part);

        let res = self
            .http
            .post(&self.secondary.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::ObjectStoreFailure(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::ObjectStoreFailure(format!(
                "secondary store returned HTTP {status}: {body}"
            )));
        }

        let stored_key = res
            .json::<SecondaryUploadReply>()
            .await
            .ok()
            .and_then(|reply| reply.key)
            .unwrap_or(object_key);

        let url = self.retrieval_url(&stored_key);
        tracing::debug!(%url, "uploaded conversion to secondary store");
        Ok((true, url))
    }

    fn retrieval_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.secondary.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

//! Remote conversion service (fallback strategy)
//!
//! Two protocol paths: staged local files go through a one-shot
//! multipart upload to `/convert`; remote URLs go through `/process`,
//! which hands back a per-job endpoint that accepts a JSON conversion
//! descriptor. When the primary store is configured the descriptor asks
//! the service to put the result into S3 server-side, and the convert
//! step returns empty bytes.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::converter::{wait_cancelled, ConversionSource, Converter, StoreUploader};
use crate::error::{Error, Result};

/// HTTP client for the remote conversion API.
#[derive(Debug, Clone)]
pub struct CloudConvertClient {
    pub base_url: String,
    pub api_key: String,
    http: reqwest::Client,
}

/// A per-job conversion process created via `/process`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionProcess {
    #[serde(default)]
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct ConversionDescriptor {
    input: &'static str,
    file: String,
    filename: String,
    outputformat: &'static str,
    wait: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    download: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<OutputSink>,
}

#[derive(Debug, Serialize)]
struct OutputSink {
    s3: S3Sink,
}

#[derive(Debug, Serialize)]
struct S3Sink {
    accesskeyid: String,
    secretaccesskey: String,
    bucket: String,
    path: String,
    acl: String,
}

/// Prepend `https:` to protocol-relative URLs.
fn absolutize(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

impl CloudConvertClient {
    pub fn new(base_url: String, api_key: String, http: reqwest::Client) -> Self {
        Self {
            base_url,
            api_key,
            http,
        }
    }

    async fn fail_from(res: reqwest::Response) -> Error {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Error::RemoteFailure { status, body }
    }

    /// One-shot conversion of a staged local file via `/convert`.
    pub async fn quick_conversion(
        &self,
        path: &str,
        input_format: &str,
        output_format: &str,
    ) -> Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tmp.html".to_string());

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(data).file_name(filename))
            .text("apikey", self.api_key.clone())
            .text("input", "upload")
            .text("download", "inline")
            .text("filename", "tmp.html")
            .text("inputformat", input_format.to_string())
            .text("outputformat", output_format.to_string());

        let res = self
            .http
            .post(format!("{}/convert", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if res.status().as_u16() != 200 {
            return Err(Self::fail_from(res).await);
        }

        Ok(res.bytes().await?.to_vec())
    }

    /// Create a conversion process via `/process`.
    pub async fn new_process(
        &self,
        input_format: &str,
        output_format: &str,
    ) -> Result<ConversionProcess> {
        let res = self
            .http
            .post(format!("{}/process", self.base_url))
            .form(&[
                ("apikey", self.api_key.as_str()),
                ("inputformat", input_format),
                ("outputformat", output_format),
            ])
            .send()
            .await?;

        if res.status().as_u16() != 200 {
            return Err(Self::fail_from(res).await);
        }

        let mut process: ConversionProcess = res.json().await?;
        process.url = absolutize(&process.url);
        Ok(process)
    }

    async fn start_conversion(
        &self,
        process: &ConversionProcess,
        descriptor: &ConversionDescriptor,
    ) -> Result<Vec<u8>> {
        let res = self.http.post(&process.url).json(descriptor).send().await?;

        if res.status().as_u16() != 200 {
            return Err(Self::fail_from(res).await);
        }

        if descriptor.download == Some("inline") {
            return Ok(res.bytes().await?.to_vec());
        }

        // The service performed the server-side store put; there is
        // nothing to hand back inline.
        Ok(Vec::new())
    }
}

/// Fallback conversion strategy backed by the remote service.
#[derive(Clone)]
pub struct CloudConvert {
    pub uploader: StoreUploader,
    pub client: CloudConvertClient,
}

impl CloudConvert {
    async fn convert_inner(&self, source: &ConversionSource) -> Result<Vec<u8>> {
        tracing::info!(uri = source.actual_uri, "converting with remote service");

        if source.is_local {
            return self
                .client
                .quick_conversion(&source.uri, "html", "pdf")
                .await;
        }

        let process = self.client.new_process("html", "pdf").await?;

        let store = &self.uploader.store;
        let descriptor = if store.is_configured() {
            tracing::debug!(key = %store.key, "remote service will place conversion in primary store");
            ConversionDescriptor {
                input: "download",
                file: source.uri.clone(),
                filename: format!("{}.html", store.key),
                outputformat: "pdf",
                wait: true,
                download: None,
                output: Some(OutputSink {
                    s3: S3Sink {
                        accesskeyid: store.access_key.clone(),
                        secretaccesskey: store.access_secret.clone(),
                        bucket: store.bucket.clone(),
                        path: store.key.clone(),
                        acl: "public-read".to_string(),
                    },
                }),
            }
        } else {
            ConversionDescriptor {
                input: "download",
                file: source.uri.clone(),
                filename: format!("{}.html", Uuid::new_v4()),
                outputformat: "pdf",
                wait: true,
                download: Some("inline"),
                output: None,
            }
        };

        self.client.start_conversion(&process, &descriptor).await
    }
}

#[async_trait]
impl Converter for CloudConvert {
    async fn convert(
        &self,
        source: &ConversionSource,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Vec<u8>> {
        tokio::select! {
            res = self.convert_inner(source) => res,
            _ = wait_cancelled(&mut cancel) => Err(Error::Cancelled),
        }
    }

    async fn upload_primary(&self, pdf: &[u8]) -> Result<bool> {
        if !self.uploader.store.is_configured() {
            return Ok(false);
        }
        if pdf.is_empty() {
            // Empty bytes mean the remote service already performed the
            // server-side put for this job.
            return Ok(true);
        }
        self.uploader.upload_primary(pdf).await
    }

    async fn upload_secondary(&self, pdf: &[u8]) -> Result<(bool, String)> {
        self.uploader.upload_secondary(pdf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_relative_urls_get_https() {
        assert_eq!(
            absolutize("//api.example.com/process/abc"),
            "https://api.example.com/process/abc"
        );
        assert_eq!(
            absolutize("https://api.example.com/process/abc"),
            "https://api.example.com/process/abc"
        );
    }

    #[test]
    fn inline_descriptor_omits_output_sink() {
        let descriptor = ConversionDescriptor {
            input: "download",
            file: "http://e.com/a.html".into(),
            filename: "x.html".into(),
            outputformat: "pdf",
            wait: true,
            download: Some("inline"),
            output: None,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["download"], "inline");
        assert_eq!(json["wait"], true);
        assert!(json.get("output").is_none());
    }

    #[test]
    fn sink_descriptor_carries_store_placement() {
        let descriptor = ConversionDescriptor {
            input: "download",
            file: "http://e.com/a.html".into(),
            filename: "k.html".into(),
            outputformat: "pdf",
            wait: true,
            download: None,
            output: Some(OutputSink {
                s3: S3Sink {
                    accesskeyid: "id".into(),
                    secretaccesskey: "secret".into(),
                    bucket: "b".into(),
                    path: "k".into(),
                    acl: "public-read".into(),
                },
            }),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("download").is_none());
        assert_eq!(json["output"]["s3"]["bucket"], "b");
        assert_eq!(json["output"]["s3"]["path"], "k");
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use log::{trace, warn};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{internal_error, upstream_error, DocshareError};
use crate::types::Severity;

pub struct RedactedFile {
    pub data: Vec<u8>,
    pub content_type: String,
    /// Needed together with the metadata to restore the original
    pub decryption_key: String,
    /// JSON document produced by the redaction service
    pub encrypted_metadata: String,
}

pub struct RestoredFile {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// External service that redacts documents and reverses the redaction.
#[async_trait]
pub trait RedactionService: Send + Sync {
    async fn redact(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
        severity: Severity,
    ) -> Result<RedactedFile, DocshareError>;

    async fn unredact(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
        decryption_key: &str,
        encrypted_metadata: &str,
    ) -> Result<RestoredFile, DocshareError>;
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    200
}

/// Upper bound for configured retries
pub const MAX_RETRIES: u32 = 10;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RedactionConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after the first one fails with a transient error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedactEncryptResponse {
    decryption_key: String,
    encrypted_metadata: serde_json::Value,
    redacted_file: String,
    content_type: Option<String>,
}

pub struct HttpRedactionService {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(
        status,
        reqwest::StatusCode::BAD_GATEWAY
            | reqwest::StatusCode::SERVICE_UNAVAILABLE
            | reqwest::StatusCode::GATEWAY_TIMEOUT
    )
}

impl HttpRedactionService {
    pub fn new(config: &RedactionConfig) -> Result<Self, DocshareError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(internal_error)?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.min(MAX_RETRIES),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Delay before retry number `attempt + 1`, doubling up to a cap
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }

    fn file_part(
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Part, DocshareError> {
        Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|_| DocshareError::bad_request("Invalid content type"))
    }

    /// Sends the request built by `make_form`, retrying connection errors,
    /// timeouts and 502/503/504 with exponential backoff. Forms are not
    /// reusable, so one is built per attempt.
    async fn post_with_retry<F>(
        &self,
        path: &str,
        make_form: F,
    ) -> Result<reqwest::Response, DocshareError>
    where
        F: Fn() -> Result<Form, DocshareError> + Send + Sync,
    {
        let url = format!("{}{}", self.url, path);
        let mut attempt = 0;
        loop {
            trace!("redaction: POST {} attempt {}", url, attempt + 1);
            let result =
                self.client.post(&url).multipart(make_form()?).send().await;
            let retryable = match result {
                Ok(res) if res.status().is_success() => return Ok(res),
                Ok(res) if is_transient_status(res.status()) => {
                    format!("status {}", res.status())
                }
                Ok(res) => {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    warn!("redaction: {} failed with {}: {}", url, status, body);
                    return Err(DocshareError::upstream(&format!(
                        "Redaction service responded with {}",
                        status
                    )));
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    err.to_string()
                }
                Err(err) => return Err(upstream_error(err)),
            };
            if attempt >= self.max_retries {
                return Err(DocshareError::upstream(&format!(
                    "Redaction service unavailable: {}",
                    retryable
                )));
            }
            let backoff = self.backoff(attempt);
            warn!(
                "redaction: {} failed ({}), retrying in {:?}",
                url, retryable, backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RedactionService for HttpRedactionService {
    async fn redact(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
        severity: Severity,
    ) -> Result<RedactedFile, DocshareError> {
        let res = self
            .post_with_retry("/redact-encrypt/", || {
                Ok(Form::new()
                    .part(
                        "file",
                        Self::file_part(file_name, content_type, data.clone())?,
                    )
                    .text("severity", severity.value().to_string()))
            })
            .await?;
        let body: RedactEncryptResponse =
            res.json().await.map_err(upstream_error)?;
        let data = BASE64_URL_SAFE
            .decode(body.redacted_file.as_bytes())
            .map_err(upstream_error)?;
        Ok(RedactedFile {
            data,
            content_type: body
                .content_type
                .unwrap_or_else(|| content_type.to_string()),
            decryption_key: body.decryption_key,
            encrypted_metadata: body.encrypted_metadata.to_string(),
        })
    }

    async fn unredact(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
        decryption_key: &str,
        encrypted_metadata: &str,
    ) -> Result<RestoredFile, DocshareError> {
        let res = self
            .post_with_retry("/unredact/", || {
                Ok(Form::new()
                    .part(
                        "file",
                        Self::file_part(file_name, content_type, data.clone())?,
                    )
                    .text("decryption_key", decryption_key.to_string())
                    .text(
                        "encrypted_metadata_json",
                        encrypted_metadata.to_string(),
                    ))
            })
            .await?;
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = res.bytes().await.map_err(upstream_error)?.to_vec();
        Ok(RestoredFile { data, content_type })
    }
}

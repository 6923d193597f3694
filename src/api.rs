//! Client for the remote compression API.
//!
//! `CompressionApi` is the seam the orchestrator and download client are
//! written against; `HttpCompressionApi` is the real implementation.

use crate::config::CompressioConfig;
use crate::error::{CompressioError, Result};
use crate::validation::FileCandidate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const API_KEY_HEADER: &str = "X-API-Key";
/// Method name that asks the server to choose the compression itself
pub const AI_METHOD: &str = "ai";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UploadResponse {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Immediate answer to `/compress`; informational only
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CompressResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub size_before: Option<u64>,
    #[serde(default)]
    pub size_after: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub elapsed: Option<f64>,
}

/// Authoritative record of a compression, as served by `/result/{id}`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ResultMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub compressed_filename: Option<String>,
    #[serde(default)]
    pub size_before: Option<u64>,
    #[serde(default)]
    pub size_after: Option<u64>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub compression_method: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedArtifact {
    pub bytes: Vec<u8>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CompressionMethod {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Side-by-side statistics for a stored file, as served by `/compare/{id}`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ComparisonReport {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub compressed_filename: Option<String>,
    #[serde(default)]
    pub size_before: Option<u64>,
    #[serde(default)]
    pub size_after: Option<u64>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub elapsed: Option<f64>,
    #[serde(default)]
    pub compression_method: Option<String>,
    #[serde(default)]
    pub decompression_time_ms: Option<f64>,
    #[serde(default)]
    pub diff_summary: Option<String>,
    #[serde(default)]
    pub sensitive_entities_detected: Option<serde_json::Value>,
    #[serde(default)]
    pub sensitive_entities_summary: Option<serde_json::Value>,
}

/// Build and limits information from `/info`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceInfo {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_upload_size_mb: Option<f64>,
    #[serde(default)]
    pub cleanup_interval_hours: Option<f64>,
    #[serde(default)]
    pub file_lifespan_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MethodsResponse {
    methods: Vec<CompressionMethod>,
}

pub trait CompressionApi: Send + Sync + 'static {
    fn upload(&self, file: &FileCandidate)
        -> impl Future<Output = Result<UploadResponse>> + Send;

    fn compress(
        &self,
        file_id: &str,
        method: &str,
    ) -> impl Future<Output = Result<CompressResponse>> + Send;

    fn result(&self, file_id: &str) -> impl Future<Output = Result<ResultMetadata>> + Send;

    fn download(
        &self,
        file_id: &str,
        original: bool,
    ) -> impl Future<Output = Result<DownloadedArtifact>> + Send;

    /// Fetch an artifact through the link a result record advertised.
    /// Relative links are resolved against the API base.
    fn download_link(&self, link: &str)
        -> impl Future<Output = Result<DownloadedArtifact>> + Send;
}

/// Pull a human readable message out of an error body (`detail` or `error`)
pub fn extract_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let field = value
        .get("detail")
        .filter(|v| !v.is_null())
        .or_else(|| value.get("error").filter(|v| !v.is_null()))?;
    match field {
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Join a possibly relative download link onto the API base
pub fn resolve_download_url(base: &str, download_url: &str) -> Result<url::Url> {
    let base = url::Url::parse(&format!("{}/", base.trim_end_matches('/')))
        .map_err(|e| CompressioError::Config(format!("Invalid server URL '{}': {}", base, e)))?;
    base.join(download_url.trim_start_matches('/')).map_err(|e| {
        CompressioError::Other(format!("Invalid download URL '{}': {}", download_url, e))
    })
}

#[derive(Debug, Clone)]
pub struct HttpCompressionApi {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
}

impl HttpCompressionApi {
    pub fn new(server_url: &str, api_key: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::builder().build()?, server_url, api_key)
    }

    pub fn from_config(config: &CompressioConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Self::with_client(builder.build()?, config.server_url(), config.api_key())
    }

    fn with_client(client: reqwest::Client, server_url: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CompressioError::Config("No API key configured".to_string()));
        }
        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.get("/health").send().await?;
        read_json(response, "Health check failed").await
    }

    pub async fn info(&self) -> Result<ServiceInfo> {
        let response = self.get("/info").send().await?;
        read_json(response, "Failed to fetch service info").await
    }

    pub async fn compare(&self, file_id: &str) -> Result<ComparisonReport> {
        let response = self
            .get(&format!("/compare/{}", urlencoding::encode(file_id)))
            .send()
            .await?;
        read_json(response, "Failed to fetch comparison").await
    }

    pub async fn compression_methods(&self) -> Result<Vec<CompressionMethod>> {
        let response = self.get("/compression_methods").send().await?;
        let methods: MethodsResponse =
            read_json(response, "Failed to list compression methods").await?;
        Ok(methods.methods)
    }
}

/// Turn a non-2xx response into an API error, preferring the server's own message
async fn error_from_response(response: reqwest::Response, fallback: &str) -> CompressioError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_detail(&body).unwrap_or_else(|| fallback.to_string());
    warn!(status = status.as_u16(), body = %body, "{}", fallback);
    CompressioError::Api {
        status: status.as_u16(),
        message,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response, fallback).await);
    }
    let status = response.status().as_u16();
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        debug!(body = %body, "Unexpected response body");
        CompressioError::Api {
            status,
            message: format!("{}: invalid response ({})", fallback, e),
        }
    })
}

fn same_origin(server_url: &str, url: &url::Url) -> bool {
    url::Url::parse(server_url)
        .map(|base| base.origin() == url.origin())
        .unwrap_or(false)
}

async fn read_artifact(response: reqwest::Response) -> Result<DownloadedArtifact> {
    if !response.status().is_success() {
        return Err(error_from_response(response, "Download failed").await);
    }

    let content_disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?.to_vec();

    Ok(DownloadedArtifact {
        bytes,
        content_disposition,
    })
}

impl CompressionApi for HttpCompressionApi {
    async fn upload(&self, file: &FileCandidate) -> Result<UploadResponse> {
        let bytes = tokio::fs::read(&file.path).await?;
        let mime = if file.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            file.mime_type.as_str()
        };
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        info!(file = %file.name, size = file.size, "Uploading file");
        let response = self.post("/upload").multipart(form).send().await?;

        #[derive(Deserialize)]
        struct RawUpload {
            #[serde(default)]
            id: Option<String>,
            #[serde(default)]
            filename: Option<String>,
            #[serde(default)]
            mime_type: Option<String>,
            #[serde(default)]
            size: Option<u64>,
        }

        let status = response.status().as_u16();
        let raw: RawUpload = read_json(response, "Upload failed").await?;
        let id = raw.id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
            CompressioError::Api {
                status,
                message: "Upload failed: no file id returned".to_string(),
            }
        })?;

        Ok(UploadResponse {
            id,
            filename: raw.filename,
            mime_type: raw.mime_type,
            size: raw.size,
        })
    }

    async fn compress(&self, file_id: &str, method: &str) -> Result<CompressResponse> {
        info!(file_id = %file_id, method = %method, "Requesting compression");
        let response = self
            .post("/compress")
            .form(&[("file_id", file_id), ("method", method)])
            .send()
            .await?;
        read_json(response, "Compression failed").await
    }

    async fn result(&self, file_id: &str) -> Result<ResultMetadata> {
        debug!(file_id = %file_id, "Fetching compression result");
        let response = self
            .get(&format!("/result/{}", urlencoding::encode(file_id)))
            .send()
            .await?;
        read_json(response, "Failed to fetch compression result").await
    }

    async fn download(&self, file_id: &str, original: bool) -> Result<DownloadedArtifact> {
        info!(file_id = %file_id, original, "Downloading file");
        let response = self
            .get(&format!("/download/{}", urlencoding::encode(file_id)))
            .query(&[("original", if original { "true" } else { "false" })])
            .send()
            .await?;

        read_artifact(response).await
    }

    async fn download_link(&self, link: &str) -> Result<DownloadedArtifact> {
        let url = resolve_download_url(&self.server_url, link)?;
        info!(url = %url, "Downloading from result link");
        let mut request = self.client.get(url.clone());
        // The key only goes to the API itself, never to a third-party host
        if same_origin(&self.server_url, &url) {
            request = request.header(API_KEY_HEADER, &self.api_key);
        }
        read_artifact(request.send().await?).await
    }
}

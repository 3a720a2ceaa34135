use std::time::Duration;

use async_trait::async_trait;
use fileforge_common::{
    error::{ForgeError, Result},
    names::{sanitize_file_name, split_extension},
    types::Utility,
};
use fileforge_jobs::{WorkContext, WorkFunction, WorkOutput};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchConfig {
    /// Falls back to the fetcher's default when absent.
    pub timeout_secs: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.timeout_secs
            && !(1..=MAX_TIMEOUT_SECS).contains(&secs)
        {
            return Err(ForgeError::InvalidConfig(format!(
                "timeoutSecs must be between 1 and {MAX_TIMEOUT_SECS}"
            )));
        }
        if self.max_bytes == Some(0) {
            return Err(ForgeError::InvalidConfig(
                "maxBytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn limit(&self) -> u64 {
        self.max_bytes.unwrap_or(DEFAULT_MAX_BYTES)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchInput {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Downloads remote documents over HTTP(S).
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl Default for DocumentFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl DocumentFetcher {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    pub fn with_client(client: reqwest::Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    fn timeout(&self, config: &FetchConfig) -> Duration {
        config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    async fn download(&self, url: &Url, config: &FetchConfig) -> Result<(Vec<u8>, Option<String>)> {
        let limit = config.limit();
        let mut response = self
            .client
            .get(url.clone())
            .timeout(self.timeout(config))
            .send()
            .await
            .map_err(|err| ForgeError::WorkFailed(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::WorkFailed(format!("{url} responded with {status}")));
        }
        if let Some(length) = response.content_length()
            && length > limit
        {
            return Err(too_large(limit));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| ForgeError::WorkFailed(format!("reading {url} failed: {err}")))?
        {
            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(too_large(limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok((body, content_type))
    }
}

fn too_large(limit: u64) -> ForgeError {
    ForgeError::WorkFailed(format!("document exceeds {limit} bytes"))
}

pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ForgeError::WorkFailed(format!("invalid url {raw:?}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ForgeError::WorkFailed(format!(
            "unsupported url scheme {scheme:?}"
        ))),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "application/pdf" => Some("pdf"),
        "text/html" => Some("html"),
        "text/plain" => Some("txt"),
        "text/csv" => Some("csv"),
        "application/json" => Some("json"),
        "application/xml" | "text/xml" => Some("xml"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Explicit name, else the last path segment, else `document-<n>`; an
/// extension is added from the content type when missing.
pub fn document_name(
    index: usize,
    input: &FetchInput,
    url: &Url,
    content_type: Option<&str>,
) -> String {
    let explicit = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty());
    let base = explicit
        .or(from_path)
        .map(sanitize_file_name)
        .unwrap_or_else(|| format!("document-{}", index + 1));

    match (split_extension(&base).1, content_type.and_then(extension_for)) {
        (None, Some(ext)) => format!("{base}.{ext}"),
        _ => base,
    }
}

#[async_trait]
impl WorkFunction for DocumentFetcher {
    type Input = FetchInput;
    type Config = FetchConfig;

    fn utility(&self) -> Utility {
        Utility::Fetch
    }

    fn validate_config(&self, config: &FetchConfig) -> Result<()> {
        config.validate()
    }

    fn identity(&self, index: usize, input: &FetchInput) -> String {
        let url = input.url.trim();
        if url.is_empty() {
            format!("document-{}", index + 1)
        } else {
            url.to_string()
        }
    }

    fn precheck(&self, input: &FetchInput) -> std::result::Result<(), String> {
        if input.url.trim().is_empty() {
            return Err("url is required".to_string());
        }
        Ok(())
    }

    async fn run(
        &self,
        ctx: &WorkContext,
        input: &FetchInput,
        config: &FetchConfig,
    ) -> Result<WorkOutput> {
        let url = parse_url(&input.url)?;
        let (body, content_type) = self.download(&url, config).await?;
        debug!(job_id = %ctx.job_id, url = %url, bytes = body.len(), "document fetched");

        let name = document_name(ctx.index, input, &url, content_type.as_deref());
        let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let artifact = ctx.write_artifact(&name, &content_type, &body).await?;
        Ok(WorkOutput::with_artifact(
            format!("fetched {} bytes", body.len()),
            artifact,
        ))
    }
}

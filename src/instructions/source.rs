use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use serde::Deserialize;
use url::Url;

use crate::error::BridgeError;

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    NotModified,
    Body { text: String, etag: Option<String> },
}

/// Where family instruction text comes from.
#[async_trait]
pub trait InstructionSource: Send + Sync {
    /// Tag of the latest published release.
    async fn latest_tag(&self) -> Result<String, BridgeError>;

    /// URL of `prompt_file` at release `tag`.
    fn prompt_url(&self, tag: &str, prompt_file: &str) -> String;

    /// GET `url`, sending `If-None-Match` when an ETag is given.
    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, BridgeError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    #[serde(default)]
    tag_name: Option<String>,
}

/// Release API + raw file host, GitHub style.
#[derive(Debug, Clone)]
pub struct GithubInstructionSource {
    http: reqwest::Client,
    release_api_url: Url,
    prompt_base_url: Url,
}

impl GithubInstructionSource {
    /// `http` should carry the instruction-source timeout.
    pub fn new(http: reqwest::Client, release_api_url: Url, prompt_base_url: Url) -> Self {
        Self {
            http,
            release_api_url,
            prompt_base_url,
        }
    }
}

#[async_trait]
impl InstructionSource for GithubInstructionSource {
    async fn latest_tag(&self) -> Result<String, BridgeError> {
        let release: ReleaseInfo = self
            .http
            .get(self.release_api_url.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        release
            .tag_name
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BridgeError::response_parse("release response has no tag_name", ""))
    }

    fn prompt_url(&self, tag: &str, prompt_file: &str) -> String {
        format!(
            "{}/{tag}/codex-rs/core/{prompt_file}",
            self.prompt_base_url.as_str().trim_end_matches('/')
        )
    }

    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, BridgeError> {
        let mut request = self.http.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        let response = response.error_for_status()?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;
        Ok(FetchOutcome::Body { text, etag })
    }
}

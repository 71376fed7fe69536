//! Outbound HTTP: the shared reqwest client and the Codex responses call.

use codex_bridge_schema::{CodexErrorBody, CodexRequestBody};
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::auth::AuthContext;
use crate::config::{CODEX_USER_AGENT, CodexConfig};
use crate::error::{BridgeError, UPSTREAM_BODY_PREVIEW_CHARS};
use crate::utils::logging::preview;

const RESPONSES_SUFFIX: &str = "/responses";
const CODEX_RESPONSES_SUFFIX: &str = "/codex/responses";
const RATE_LIMIT_HEADER_PREFIX: &str = "x-ratelimit-";

const ACCOUNT_ID_HEADER: &str = "chatgpt-account-id";
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "responses=experimental");
const ORIGINATOR_HEADER: (&str, &str) = ("originator", "codex_cli_rs");
const SESSION_ID_HEADER: &str = "session_id";
const CONVERSATION_ID_HEADER: &str = "conversation_id";

/// `<base>/codex/responses`. Bases already ending in `/responses` or `/codex/responses` are
/// folded onto the same URL.
pub fn responses_url(base: &Url) -> Url {
    let mut url = base.clone();
    let trimmed = base.path().trim_end_matches('/');
    let root = trimmed
        .strip_suffix(CODEX_RESPONSES_SUFFIX)
        .or_else(|| trimmed.strip_suffix(RESPONSES_SUFFIX))
        .unwrap_or(trimmed);
    url.set_path(&format!("{root}{CODEX_RESPONSES_SUFFIX}"));
    url
}

/// Shared outbound client: proxy, user agent, no redirects, and HTTP/1 without pooling unless
/// multiplexing is enabled.
///
/// `timeout` bounds whole exchanges. The backend client passes `None`: its streams are bounded
/// by the response deadline plus the idle timeout instead.
pub fn build_http_client(
    cfg: &CodexConfig,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    let mut builder = reqwest::Client::builder()
        .user_agent(CODEX_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10));

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if cfg.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    builder.default_headers(headers).build()
}

/// POSTs request bodies to the Codex responses endpoint.
#[derive(Debug, Clone)]
pub struct CodexClient {
    http: reqwest::Client,
    responses_url: Url,
    response_deadline: Duration,
}

impl CodexClient {
    /// `response_deadline` bounds the wait for response headers (first token latency).
    pub fn new(http: reqwest::Client, api_base_url: &Url, response_deadline: Duration) -> Self {
        Self {
            http,
            responses_url: responses_url(api_base_url),
            response_deadline,
        }
    }

    pub fn responses_url(&self) -> &Url {
        &self.responses_url
    }

    pub fn build_request(
        &self,
        auth: &AuthContext,
        body: &CodexRequestBody,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let mut request = self
            .http
            .post(self.responses_url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", auth.access_token))
            .header(ACCOUNT_ID_HEADER, auth.account_id.as_str())
            .header(BETA_HEADER.0, BETA_HEADER.1)
            .header(ORIGINATOR_HEADER.0, ORIGINATOR_HEADER.1)
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json");

        if let Some(key) = body.prompt_cache_key.as_deref() {
            request = request
                .header(SESSION_ID_HEADER, key)
                .header(CONVERSATION_ID_HEADER, key);
        }

        request.json(body).build()
    }

    /// Send once. Non-success statuses become [`BridgeError::BackendHttp`]; nothing is retried.
    pub async fn post(
        &self,
        auth: &AuthContext,
        body: &CodexRequestBody,
    ) -> Result<reqwest::Response, BridgeError> {
        let request = self.build_request(auth, body)?;
        info!(
            channel = "codex",
            account_id = %auth.account_id,
            model = %body.model,
            "[Codex] Post responses -> {}",
            body.model
        );

        let response = tokio::time::timeout(self.response_deadline, self.http.execute(request))
            .await
            .map_err(|_| BridgeError::BackendTimeout(self.response_deadline))??;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(backend_error(response).await)
    }
}

async fn backend_error(response: reqwest::Response) -> BridgeError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => format!("<failed to read body: {e}>"),
    };

    let parsed = serde_json::from_str::<CodexErrorBody>(&body).ok();
    let message = parsed
        .as_ref()
        .and_then(CodexErrorBody::message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| preview(trimmed, UPSTREAM_BODY_PREVIEW_CHARS))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown backend error")
                .to_string()
        });

    let rate_limit: BTreeMap<String, String> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with(RATE_LIMIT_HEADER_PREFIX))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| parsed.as_ref().and_then(CodexErrorBody::quota_reset_delay));

    debug!(
        %status,
        body = %preview(&body, UPSTREAM_BODY_PREVIEW_CHARS),
        ?retry_after,
        "Codex backend rejected request"
    );

    BridgeError::BackendHttp {
        status,
        message,
        retry_after,
        rate_limit,
        body,
    }
}

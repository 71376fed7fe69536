use codex_bridge_schema::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::{AuthManager, CredentialStore, OauthRefresher};
use crate::client::{CodexClient, build_http_client};
use crate::config::CodexConfig;
use crate::error::BridgeError;
use crate::instructions::{GithubInstructionSource, InstructionCache};
use crate::models::{normalize, resolve_reasoning};
use crate::request::{BuildContext, build_request_body, normalize_tools};
use crate::response::{SSE_IDLE_TIMEOUT, adapt_response};

/// One chat completion end to end: auth, model resolution, payload, backend call, adaptation.
pub struct CodexAdapter {
    auth: AuthManager,
    instructions: InstructionCache,
    client: CodexClient,
    codex_mode: bool,
}

impl CodexAdapter {
    pub fn new(
        auth: AuthManager,
        instructions: InstructionCache,
        client: CodexClient,
        codex_mode: bool,
    ) -> Self {
        Self {
            auth,
            instructions,
            client,
            codex_mode,
        }
    }

    /// Wire every collaborator from configuration, one HTTP client per timeout class.
    pub fn from_config(cfg: &CodexConfig) -> Result<Self, BridgeError> {
        let backend_http = build_http_client(cfg, None)?;
        let issuer_http = build_http_client(cfg, Some(cfg.issuer_timeout()))?;
        let source_http = build_http_client(cfg, Some(cfg.instructions_timeout()))?;

        let refresher = OauthRefresher::new(issuer_http, &cfg.token_url)?;
        let auth = AuthManager::new(
            CredentialStore::new(cfg.auth_file_path()),
            Arc::new(refresher),
            cfg,
        );
        let instructions = InstructionCache::new(
            Arc::new(GithubInstructionSource::new(
                source_http,
                cfg.release_api_url.clone(),
                cfg.prompt_base_url.clone(),
            )),
            cfg.cache_dir_path(),
            Duration::from_secs(cfg.instructions_ttl_secs),
        );
        let client = CodexClient::new(backend_http, &cfg.api_base_url, cfg.request_timeout());

        info!(
            auth_file = %cfg.auth_file_path().display(),
            cache_dir = %cfg.cache_dir_path().display(),
            responses_url = %client.responses_url(),
            codex_mode = cfg.codex_mode,
            "Codex adapter ready"
        );
        Ok(Self::new(auth, instructions, client, cfg.codex_mode))
    }

    pub async fn completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, BridgeError> {
        validate(request)?;
        let auth = self.auth.get_auth_context().await?;

        let model = normalize(&request.model);
        let reasoning = resolve_reasoning(
            &model,
            request.reasoning_effort.as_ref(),
            request.verbosity.as_deref(),
        );
        debug!(
            requested = %request.model,
            normalized = %model.normalized_id,
            family = %model.family,
            effort = reasoning.effort.as_str(),
            "Model resolved"
        );

        let family_instructions = if self.codex_mode {
            Some(self.instructions.get_instructions(model.family).await)
        } else {
            None
        };

        let body = build_request_body(
            request,
            BuildContext {
                model: &model,
                reasoning,
                codex_mode: self.codex_mode,
                family_instructions: family_instructions.as_deref(),
            },
        )?;

        let response = self.client.post(&auth, &body).await?;
        adapt_response(response, &model.normalized_id, SSE_IDLE_TIMEOUT).await
    }

    /// Degenerate stream: the finished completion as a single chunk.
    pub async fn completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<impl Stream<Item = ChatCompletionChunk> + use<>, BridgeError> {
        let completion = self.completion(request).await?;
        Ok(futures::stream::iter([ChatCompletionChunk::from(&completion)]))
    }
}

/// Input checks that need no I/O, so a malformed request never costs a token refresh
/// or an instruction fetch.
fn validate(request: &ChatCompletionRequest) -> Result<(), BridgeError> {
    if request.model.trim().is_empty() {
        return Err(BridgeError::PayloadValidation("model is required".to_string()));
    }
    if request.messages.is_empty() {
        return Err(BridgeError::PayloadValidation(
            "messages must not be empty".to_string(),
        ));
    }
    if let Some(tools) = request.tools.as_deref() {
        normalize_tools(tools)?;
    }
    Ok(())
}

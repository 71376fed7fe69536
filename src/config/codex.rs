use directories::BaseDirs;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Public OAuth client id of the Codex CLI, used when the credential record carries none.
pub const CODEX_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";

/// User-Agent sent on every outbound call.
pub const CODEX_USER_AGENT: &str = "codex_cli_rs/0.95.0 (Debian 12.0.0; x86_64) vscode/1.108.2";

/// Backend, issuer and instruction-source settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CodexConfig {
    /// Credential record written by the Codex CLI.
    /// TOML: `codex.auth_file`. Env: `CODEX_AUTH_FILE`. Default: `~/.codex/auth.json`.
    #[serde(default)]
    pub auth_file: Option<PathBuf>,

    /// Directory holding cached family instructions.
    /// TOML: `codex.cache_dir`. Env: `CODEX_CACHE_DIR`. Default: `~/.opencode/cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Inject family instructions and the tool bridge.
    /// TOML: `codex.codex_mode`. Env: `CODEX_MODE`. Default: `true`.
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_lax")]
    pub codex_mode: bool,

    /// Force debug-level logging.
    /// TOML: `codex.debug`. Env: `CODEX_DEBUG`. Default: `false`.
    #[serde(default, deserialize_with = "deserialize_bool_lax")]
    pub debug: bool,

    /// Backend API base. A trailing `/responses` is tolerated and normalized.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,

    #[serde(default = "default_token_url")]
    pub token_url: Url,

    /// OAuth client id used when the credential record does not name one.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Release API answering with `{"tag_name": ...}` for the latest instruction release.
    #[serde(default = "default_release_api_url")]
    pub release_api_url: Url,

    /// Raw file host; prompt files live at `<prompt_base_url>/<tag>/codex-rs/core/<file>`.
    #[serde(default = "default_prompt_base_url")]
    pub prompt_base_url: Url,

    /// Optional upstream HTTP proxy for every outbound client.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing; disabled forces HTTP/1 without pooling.
    #[serde(default)]
    pub enable_multiplexing: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_short_timeout_secs")]
    pub issuer_timeout_secs: u64,

    #[serde(default = "default_short_timeout_secs")]
    pub instructions_timeout_secs: u64,

    /// Tokens within this many seconds of expiry are refreshed.
    #[serde(default = "default_token_refresh_buffer_secs")]
    pub token_refresh_buffer_secs: u64,

    /// Lifetime assumed for a token whose expiry cannot be determined.
    #[serde(default = "default_token_default_expiry_secs")]
    pub token_default_expiry_secs: u64,

    #[serde(default = "default_instructions_ttl_secs")]
    pub instructions_ttl_secs: u64,

    /// Models advertised on `GET /v1/models`.
    #[serde(default = "default_model_list")]
    pub model_list: Vec<String>,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            auth_file: None,
            cache_dir: None,
            codex_mode: true,
            debug: false,
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            client_id: default_client_id(),
            release_api_url: default_release_api_url(),
            prompt_base_url: default_prompt_base_url(),
            proxy: None,
            enable_multiplexing: false,
            request_timeout_secs: default_request_timeout_secs(),
            issuer_timeout_secs: default_short_timeout_secs(),
            instructions_timeout_secs: default_short_timeout_secs(),
            token_refresh_buffer_secs: default_token_refresh_buffer_secs(),
            token_default_expiry_secs: default_token_default_expiry_secs(),
            instructions_ttl_secs: default_instructions_ttl_secs(),
            model_list: default_model_list(),
        }
    }
}

impl CodexConfig {
    pub fn auth_file_path(&self) -> PathBuf {
        self.auth_file
            .clone()
            .unwrap_or_else(|| home_dir().join(".codex").join("auth.json"))
    }

    pub fn cache_dir_path(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".opencode").join("cache"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn issuer_timeout(&self) -> Duration {
        Duration::from_secs(self.issuer_timeout_secs)
    }

    pub fn instructions_timeout(&self) -> Duration {
        Duration::from_secs(self.instructions_timeout_secs)
    }
}

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Accepts booleans, numbers and the usual string spellings (`1/0`, `true/false`, `on/off`,
/// `yes/no`), since environment values arrive as whatever figment guesses them to be.
fn deserialize_bool_lax<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got {other:?}"
            ))),
        },
        _ => Err(serde::de::Error::custom("expected a boolean flag")),
    }
}

fn default_true() -> bool {
    true
}

fn default_api_base_url() -> Url {
    Url::parse("https://chatgpt.com/backend-api").expect("invalid fixed backend URL")
}

fn default_token_url() -> Url {
    Url::parse("https://auth.openai.com/oauth/token").expect("invalid fixed token URL")
}

fn default_client_id() -> String {
    CODEX_CLIENT_ID.to_string()
}

fn default_release_api_url() -> Url {
    Url::parse("https://api.github.com/repos/openai/codex/releases/latest")
        .expect("invalid fixed release API URL")
}

fn default_prompt_base_url() -> Url {
    Url::parse("https://raw.githubusercontent.com/openai/codex")
        .expect("invalid fixed prompt base URL")
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_short_timeout_secs() -> u64 {
    20
}

fn default_token_refresh_buffer_secs() -> u64 {
    300
}

fn default_token_default_expiry_secs() -> u64 {
    3600
}

fn default_instructions_ttl_secs() -> u64 {
    900
}

fn default_model_list() -> Vec<String> {
    crate::models::CANONICAL_MODELS
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lax_bool_accepts_env_spellings() {
        for (raw, expected) in [
            (json!("0"), false),
            (json!("off"), false),
            (json!("FALSE"), false),
            (json!(0), false),
            (json!("1"), true),
            (json!("on"), true),
            (json!(true), true),
        ] {
            let cfg: CodexConfig =
                serde_json::from_value(json!({ "codex_mode": raw })).expect("parse");
            assert_eq!(cfg.codex_mode, expected);
        }
    }

    #[test]
    fn lax_bool_rejects_garbage() {
        assert!(serde_json::from_value::<CodexConfig>(json!({ "debug": "maybe" })).is_err());
    }

    #[test]
    fn explicit_paths_win_over_home_defaults() {
        let cfg = CodexConfig {
            auth_file: Some(PathBuf::from("/tmp/auth.json")),
            ..Default::default()
        };
        assert_eq!(cfg.auth_file_path(), PathBuf::from("/tmp/auth.json"));
        assert!(cfg.cache_dir_path().ends_with(".opencode/cache"));
    }
}

mod basic;
mod codex;

pub use basic::BasicConfig;
pub use codex::{CODEX_CLIENT_ID, CODEX_USER_AGENT, CodexConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Front-end server settings (`basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Backend and credential settings (`codex` table in config.toml).
    #[serde(default)]
    pub codex: CodexConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variables read on top of the file, keyed by their name after `CODEX_`.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("auth_file", "codex.auth_file"),
    ("cache_dir", "codex.cache_dir"),
    ("mode", "codex.codex_mode"),
    ("debug", "codex.debug"),
];

impl Config {
    /// Defaults, then `config.toml` when present, then the `CODEX_*` environment overrides.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(env_overrides())
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Level the subscriber starts with when `RUST_LOG` is unset.
    pub fn effective_loglevel(&self) -> &str {
        if self.codex.debug {
            "debug"
        } else {
            self.basic.loglevel.as_str()
        }
    }
}

fn env_overrides() -> Env {
    Env::prefixed("CODEX_")
        .filter(|key| ENV_OVERRIDES.iter().any(|(name, _)| key.as_str() == *name))
        .map(|key| {
            ENV_OVERRIDES
                .iter()
                .find(|(name, _)| key.as_str() == *name)
                .map_or_else(|| key.as_str().to_string(), |(_, path)| (*path).to_string())
                .into()
        })
}

/// Global, lazily-initialized configuration instance for the binary.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|err| panic!("failed to extract configuration: {err}"))
});

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RefreshedToken;
use crate::error::BridgeError;
use crate::utils::fs::write_atomic;

/// Keys under which the CLI may nest its token fields, in lookup order.
const TOKEN_SECTIONS: &[&str] = &["chatgpt", "auth", "tokens"];

/// The on-disk OAuth record, kept as raw JSON so unknown fields survive a write-back.
#[derive(Clone)]
pub struct CredentialRecord {
    raw: Map<String, Value>,
    section: Option<&'static str>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("section", &self.section)
            .field("has_access_token", &self.access_token().is_some())
            .field("has_refresh_token", &self.refresh_token().is_some())
            .field("expires_at", &self.expires_at())
            .finish()
    }
}

impl CredentialRecord {
    pub fn from_json(value: Value) -> Result<Self, BridgeError> {
        let Value::Object(raw) = value else {
            return Err(BridgeError::AuthToken(
                "credential record is not a JSON object".to_string(),
            ));
        };
        let section = TOKEN_SECTIONS
            .iter()
            .copied()
            .find(|key| raw.get(*key).is_some_and(Value::is_object));
        Ok(Self { raw, section })
    }

    fn tokens(&self) -> &Map<String, Value> {
        self.section
            .and_then(|key| self.raw.get(key))
            .and_then(Value::as_object)
            .unwrap_or(&self.raw)
    }

    fn insert_token(&mut self, key: &str, value: Value) {
        let section = self
            .section
            .and_then(|name| self.raw.get_mut(name))
            .and_then(Value::as_object_mut);
        match section {
            Some(tokens) => {
                tokens.insert(key.to_string(), value);
            }
            None => {
                self.raw.insert(key.to_string(), value);
            }
        }
    }

    fn token_str(&self, key: &str) -> Option<&str> {
        self.tokens()
            .get(key)
            .or_else(|| self.raw.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token_str("access_token")
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token_str("refresh_token")
    }

    pub fn client_id(&self) -> Option<&str> {
        self.token_str("client_id")
    }

    /// `expires_at` as written by a refresh: unix seconds (integer or float) or RFC 3339.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.tokens().get("expires_at")? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Write the refreshed fields back into the record, leaving everything else alone.
    pub(crate) fn apply_refresh(&mut self, refreshed: &RefreshedToken, expiry: DateTime<Utc>) {
        self.insert_token("access_token", Value::String(refreshed.access_token.clone()));
        self.insert_token("expires_at", Value::from(expiry.timestamp()));
        if let Some(refresh_token) = &refreshed.refresh_token {
            self.insert_token("refresh_token", Value::String(refresh_token.clone()));
        }
        if let Some(id_token) = &refreshed.id_token {
            self.insert_token("id_token", Value::String(id_token.clone()));
        }
        if self.raw.contains_key("last_refresh") {
            self.raw.insert(
                "last_refresh".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Reads and atomically rewrites the credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<CredentialRecord, BridgeError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BridgeError::AuthFileNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            BridgeError::AuthToken(format!("failed to parse credential record: {e}"))
        })?;
        CredentialRecord::from_json(value)
    }

    /// Replace the file atomically so a cancelled refresh never leaves a torn record.
    pub async fn save(&self, record: &CredentialRecord) -> Result<(), BridgeError> {
        let body = serde_json::to_vec_pretty(record.as_json()).map_err(|e| {
            BridgeError::AuthToken(format!("failed to encode credential record: {e}"))
        })?;
        write_atomic(&self.path, &body).await?;
        debug!(path = %self.path.display(), "Credential record written");
        Ok(())
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Error body returned by the Codex backend on non-success statuses.
///
/// Two shapes show up in practice: an OpenAI-style `{"error": {...}}` envelope and a
/// FastAPI-style `{"detail": "..."}`. Both deserialize here; `detail` lands in `extra`.
#[derive(Debug, Deserialize, Serialize)]
pub struct CodexErrorBody {
    #[serde(rename = "error")]
    #[serde(default)]
    pub inner: CodexErrorObject,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CodexErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// `null` and a missing field both read as `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Value>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl CodexErrorBody {
    /// Human readable message: `error.message`, then top-level `detail`.
    pub fn message(&self) -> Option<String> {
        self.inner
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                self.extra
                    .get("detail")
                    .and_then(|d| match d {
                        Value::String(s) => Some(s.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .filter(|m| !m.trim().is_empty())
            })
    }

    /// Seconds until the usage quota resets, when the backend reports it.
    pub fn quota_reset_delay(&self) -> Option<u64> {
        self.inner
            .extra
            .get("resets_at")
            .and_then(Value::as_i64)
            .and_then(|ts| {
                let diff = ts.saturating_sub(Utc::now().timestamp());
                u64::try_from(diff)
                    .ok()
                    .filter(|d| *d > 0)
                    .map(|d| d.saturating_add(1))
            })
            .or_else(|| {
                self.inner
                    .extra
                    .get("resets_in_seconds")
                    .and_then(Value::as_u64)
                    .map(|s| s.saturating_add(1))
            })
    }
}

//! OpenAI-compatible error envelope returned to chat-completions callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codex::{CodexErrorBody, CodexErrorObject};

/// `{ "error": { "message": "...", "type": "...", "code": "...", "param": ... } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatErrorBody {
    #[serde(rename = "error")]
    pub inner: ChatErrorObject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Value>,
}

impl ChatErrorBody {
    pub fn new(r#type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            inner: ChatErrorObject {
                code: None,
                message: message.into(),
                r#type: r#type.into(),
                param: None,
            },
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.inner.code = Some(code.into());
        self
    }
}

impl From<CodexErrorBody> for ChatErrorBody {
    fn from(upstream_err: CodexErrorBody) -> Self {
        let message = upstream_err.message();
        let CodexErrorObject {
            code, r#type, param, ..
        } = upstream_err.inner;

        ChatErrorBody {
            inner: ChatErrorObject {
                code,
                message: message
                    .unwrap_or_else(|| "Upstream error (check server logs for details).".to_string()),
                r#type: r#type.unwrap_or_else(|| "upstream_error".to_string()),
                param,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_error_object_converts() {
        let upstream: CodexErrorBody = serde_json::from_value(json!({
            "error": {
                "code": "unsupported_value",
                "message": "Unsupported value",
                "type": "invalid_request_error",
                "param": "reasoning.effort"
            }
        }))
        .expect("parse upstream");

        let out = ChatErrorBody::from(upstream).inner;
        assert_eq!(out.r#type, "invalid_request_error");
        assert_eq!(out.code.as_deref(), Some("unsupported_value"));
        assert_eq!(out.message, "Unsupported value");
        assert_eq!(out.param.as_ref().and_then(Value::as_str), Some("reasoning.effort"));
    }

    #[test]
    fn detail_only_body_uses_detail_as_message() {
        let upstream: CodexErrorBody =
            serde_json::from_value(json!({ "detail": "The 'x' model is not supported." }))
                .expect("parse upstream");

        let out = ChatErrorBody::from(upstream).inner;
        assert_eq!(out.message, "The 'x' model is not supported.");
        assert_eq!(out.r#type, "upstream_error");
    }
}

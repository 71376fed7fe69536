use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request body posted to the Codex responses endpoint.
///
/// The bridge controls the structural fields. Forwarded sampling options travel in `extra`
/// and are flattened into the top level on serialization.
#[derive(Debug, Clone, Serialize)]
pub struct CodexRequestBody {
    pub model: String,

    pub instructions: String,

    pub input: Vec<CodexInputItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,

    pub reasoning: Reasoning,

    pub text: TextControls,

    pub include: Vec<String>,

    pub store: bool,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_cache_key: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    pub effort: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextControls {
    pub verbosity: String,
}

/// One entry of the `input` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexInputItem {
    /// `content` is a string or an array of typed parts (`input_text`, ...).
    Message { role: String, content: Value },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput { call_id: String, output: String },
}

impl CodexInputItem {
    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Message {
            role: role.into(),
            content: Value::String(content.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_items_serialize_with_type_tag() {
        let items = vec![
            CodexInputItem::message("user", "hi"),
            CodexInputItem::FunctionCall {
                call_id: "c1".to_string(),
                name: "lookup".to_string(),
                arguments: "{}".to_string(),
            },
            CodexInputItem::FunctionCallOutput {
                call_id: "c1".to_string(),
                output: "42".to_string(),
            },
        ];

        let out = serde_json::to_value(&items).expect("serialize");
        assert_eq!(
            out,
            json!([
                { "type": "message", "role": "user", "content": "hi" },
                { "type": "function_call", "call_id": "c1", "name": "lookup", "arguments": "{}" },
                { "type": "function_call_output", "call_id": "c1", "output": "42" }
            ])
        );
    }

    #[test]
    fn extra_fields_flatten_to_top_level() {
        let mut extra = BTreeMap::new();
        extra.insert("temperature".to_string(), json!(0.3));

        let body = CodexRequestBody {
            model: "gpt-5.1-codex".to_string(),
            instructions: "be brief".to_string(),
            input: vec![CodexInputItem::message("user", "hi")],
            tools: None,
            reasoning: Reasoning {
                effort: "medium".to_string(),
                summary: "auto".to_string(),
            },
            text: TextControls {
                verbosity: "medium".to_string(),
            },
            include: vec!["reasoning.encrypted_content".to_string()],
            store: false,
            stream: true,
            prompt_cache_key: None,
            extra,
        };

        let out = serde_json::to_value(&body).expect("serialize");
        assert_eq!(out["temperature"], json!(0.3));
        assert_eq!(out["store"], json!(false));
        assert!(out.get("tools").is_none());
        assert!(out.get("prompt_cache_key").is_none());
    }
}

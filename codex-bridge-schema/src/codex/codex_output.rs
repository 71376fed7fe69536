use serde::Deserialize;
use serde_json::Value;

/// A finished response object, either posted as a plain JSON document or carried by a
/// terminal stream event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodexResponseDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    pub output: Vec<CodexOutputItem>,
    #[serde(default)]
    pub usage: Option<CodexUsage>,
    #[serde(default)]
    pub incomplete_details: Option<Value>,
}

/// Token accounting. Chat-style key names are accepted as aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct CodexUsage {
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u64,
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl CodexUsage {
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or_else(|| self.input_tokens.saturating_add(self.output_tokens))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexOutputItem {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default = "assistant_role")]
        role: String,
        #[serde(default)]
        content: Vec<CodexContentPart>,
    },
    Reasoning {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        summary: Vec<CodexContentPart>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        /// Usually a JSON string; some backends send the object itself.
        #[serde(default)]
        arguments: Value,
    },
    #[serde(other)]
    Other,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

impl CodexOutputItem {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message { id, .. } | Self::Reasoning { id, .. } | Self::FunctionCall { id, .. } => {
                id.as_deref()
            }
            Self::Other => None,
        }
    }

    /// Concatenated text of a message's `output_text` parts or a reasoning item's summaries.
    pub fn text(&self) -> String {
        let parts = match self {
            Self::Message { content, .. } => content,
            Self::Reasoning { summary, .. } => summary,
            Self::FunctionCall { .. } | Self::Other => return String::new(),
        };
        parts.iter().filter_map(CodexContentPart::text).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexContentPart {
    OutputText { text: String },
    SummaryText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

impl CodexContentPart {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::OutputText { text } | Self::SummaryText { text } => Some(text),
            Self::Refusal { .. } | Self::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_with_mixed_items_parses() {
        let doc: CodexResponseDocument = serde_json::from_value(json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                { "type": "reasoning", "id": "rs_1", "summary": [{ "type": "summary_text", "text": "thinking" }] },
                { "type": "message", "id": "msg_1", "role": "assistant",
                  "content": [{ "type": "output_text", "text": "Hello", "annotations": [] }] },
                { "type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "f", "arguments": "{}" },
                { "type": "web_search_call", "id": "ws_1" }
            ],
            "usage": { "input_tokens": 3, "output_tokens": 4 }
        }))
        .expect("parse document");

        assert_eq!(doc.output.len(), 4);
        assert_eq!(doc.output[0].text(), "thinking");
        assert_eq!(doc.output[1].text(), "Hello");
        assert_eq!(doc.output[2].id(), Some("fc_1"));
        assert_eq!(doc.output[3], CodexOutputItem::Other);
        assert_eq!(doc.usage.map(|u| u.total()), Some(7));
    }

    #[test]
    fn usage_accepts_chat_style_names() {
        let usage: CodexUsage = serde_json::from_value(json!({
            "prompt_tokens": 5, "completion_tokens": 6, "total_tokens": 20
        }))
        .expect("parse usage");
        assert_eq!(usage.input_tokens, 5);
        assert_eq!(usage.output_tokens, 6);
        assert_eq!(usage.total(), 20);
    }
}

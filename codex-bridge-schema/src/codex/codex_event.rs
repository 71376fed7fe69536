use serde::Deserialize;
use serde_json::Value;

use super::codex_output::CodexOutputItem;

/// Typed view of one `data:` payload on the Codex event stream.
///
/// Event types not listed here (`response.created`, `response.in_progress`, part markers, ...)
/// parse as [`CodexStreamEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum CodexStreamEvent {
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: CodexOutputItem },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: CodexOutputItem },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { item_id: String, delta: String },

    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta { item_id: String, delta: String },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { item_id: String, delta: String },

    #[serde(rename = "response.completed", alias = "response.done")]
    Completed {
        #[serde(default)]
        response: Value,
    },

    #[serde(rename = "response.incomplete")]
    Incomplete {
        #[serde(default)]
        response: Value,
    },

    #[serde(rename = "response.failed")]
    Failed {
        #[serde(default)]
        response: Value,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delta_events_parse() {
        let ev: CodexStreamEvent = serde_json::from_value(json!({
            "type": "response.output_text.delta",
            "item_id": "msg_1",
            "output_index": 0,
            "content_index": 0,
            "sequence_number": 4,
            "delta": "Hel"
        }))
        .expect("parse");
        assert_eq!(
            ev,
            CodexStreamEvent::OutputTextDelta {
                item_id: "msg_1".to_string(),
                delta: "Hel".to_string()
            }
        );
    }

    #[test]
    fn response_done_is_an_alias_for_completed() {
        let ev: CodexStreamEvent = serde_json::from_value(json!({
            "type": "response.done",
            "response": { "usage": { "input_tokens": 1 } }
        }))
        .expect("parse");
        assert!(matches!(ev, CodexStreamEvent::Completed { .. }));
    }

    #[test]
    fn unlisted_types_are_unknown() {
        let ev: CodexStreamEvent =
            serde_json::from_value(json!({ "type": "response.created", "response": {} }))
                .expect("parse");
        assert_eq!(ev, CodexStreamEvent::Unknown);
    }

    #[test]
    fn function_call_item_done_parses() {
        let ev: CodexStreamEvent = serde_json::from_value(json!({
            "type": "response.output_item.done",
            "output_index": 1,
            "item": {
                "type": "function_call",
                "id": "fc_1",
                "call_id": "call_1",
                "name": "get_weather",
                "arguments": "{\"city\":\"Paris\"}",
                "status": "completed"
            }
        }))
        .expect("parse");

        let CodexStreamEvent::OutputItemDone {
            item: CodexOutputItem::FunctionCall { call_id, name, .. },
        } = ev
        else {
            panic!("expected function call item");
        };
        assert_eq!(call_id.as_deref(), Some("call_1"));
        assert_eq!(name.as_deref(), Some("get_weather"));
    }
}

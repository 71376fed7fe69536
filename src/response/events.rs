use codex_bridge_schema::chat::ToolCall;
use codex_bridge_schema::codex::CodexOutputItem;
use codex_bridge_schema::CodexStreamEvent;
use serde::Deserialize;
use serde_json::Value;

use super::tool_calls::extract_tool_call;
use crate::request::arguments_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    Message,
    Reasoning,
    FunctionCall,
}

/// Which buffer a delta appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeltaChannel {
    Text,
    Reasoning,
    Arguments,
}

/// Item payload as carried by `output_item.added` / `output_item.done`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemSnapshot {
    pub id: Option<String>,
    pub kind: ItemKind,
    /// Final text for messages and reasoning. Empty while the item is still streaming.
    pub text: String,
    /// Tool call for function-call items, when the payload names the function.
    pub call: Option<ToolCall>,
    pub call_id: Option<String>,
}

/// One stream event reduced to what the state machine acts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StreamEvent {
    ItemAdded(ItemSnapshot),
    Delta {
        item_id: String,
        channel: DeltaChannel,
        delta: String,
    },
    ItemDone(ItemSnapshot),
    /// `response.completed` / `response.done` / `response.incomplete`.
    Terminal { response: Value, incomplete: bool },
    /// `error` / `response.failed`.
    Failed { message: String },
    /// Lifecycle and part markers with no effect on the result.
    Ignored,
}

/// Classify one `data:` payload. Typed parse first; a failed or unrecognized typed parse
/// falls back to matching the `type` suffix on the raw JSON.
pub(crate) fn classify(value: &Value) -> StreamEvent {
    match CodexStreamEvent::deserialize(value) {
        Ok(CodexStreamEvent::Unknown) | Err(_) => classify_lenient(value),
        Ok(typed) => from_typed(typed, value),
    }
}

fn from_typed(event: CodexStreamEvent, raw: &Value) -> StreamEvent {
    match event {
        CodexStreamEvent::OutputItemAdded { item } => item_from_typed(item, raw.get("item"))
            .map_or(StreamEvent::Ignored, StreamEvent::ItemAdded),
        CodexStreamEvent::OutputItemDone { item } => item_from_typed(item, raw.get("item"))
            .map_or(StreamEvent::Ignored, StreamEvent::ItemDone),
        CodexStreamEvent::OutputTextDelta { item_id, delta } => StreamEvent::Delta {
            item_id,
            channel: DeltaChannel::Text,
            delta,
        },
        CodexStreamEvent::ReasoningSummaryTextDelta { item_id, delta } => StreamEvent::Delta {
            item_id,
            channel: DeltaChannel::Reasoning,
            delta,
        },
        CodexStreamEvent::FunctionCallArgumentsDelta { item_id, delta } => StreamEvent::Delta {
            item_id,
            channel: DeltaChannel::Arguments,
            delta,
        },
        CodexStreamEvent::Completed { response } => StreamEvent::Terminal {
            response,
            incomplete: false,
        },
        CodexStreamEvent::Incomplete { response } => StreamEvent::Terminal {
            response,
            incomplete: true,
        },
        CodexStreamEvent::Failed { response } => StreamEvent::Failed {
            message: failure_message(&response),
        },
        CodexStreamEvent::Error { code, message } => StreamEvent::Failed {
            message: match (code, message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message,
                (Some(code), None) => code,
                (None, None) => "backend reported an error".to_string(),
            },
        },
        CodexStreamEvent::Unknown => StreamEvent::Ignored,
    }
}

pub(super) fn item_from_typed(item: CodexOutputItem, raw: Option<&Value>) -> Option<ItemSnapshot> {
    let snapshot = match item {
        CodexOutputItem::Message { ref id, .. } => ItemSnapshot {
            id: id.clone(),
            kind: ItemKind::Message,
            text: item.text(),
            call: None,
            call_id: None,
        },
        CodexOutputItem::Reasoning { ref id, .. } => ItemSnapshot {
            id: id.clone(),
            kind: ItemKind::Reasoning,
            text: item.text(),
            call: None,
            call_id: None,
        },
        CodexOutputItem::FunctionCall {
            id,
            call_id,
            name: Some(name),
            arguments,
        } => ItemSnapshot {
            call: Some(ToolCall::function(
                call_id.clone().or_else(|| id.clone()).unwrap_or_default(),
                name,
                arguments_string(Some(&arguments)),
            )),
            id,
            kind: ItemKind::FunctionCall,
            text: String::new(),
            call_id,
        },
        // A function call without a top-level name may still use the nested layout.
        CodexOutputItem::FunctionCall { .. } | CodexOutputItem::Other => {
            return raw.and_then(item_from_value);
        }
    };
    Some(snapshot)
}

/// Schema-relaxed item reading straight from JSON.
pub(crate) fn item_from_value(raw: &Value) -> Option<ItemSnapshot> {
    let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
    let call_id = raw.get("call_id").and_then(Value::as_str).map(str::to_string);
    let kind = match raw.get("type").and_then(Value::as_str) {
        Some("message") => ItemKind::Message,
        Some("reasoning") => ItemKind::Reasoning,
        Some("function_call") => ItemKind::FunctionCall,
        _ if raw.get("function").is_some_and(Value::is_object) => ItemKind::FunctionCall,
        _ => return None,
    };

    let (text, call) = match kind {
        ItemKind::Message => (collect_text(raw.get("content")), None),
        ItemKind::Reasoning => (collect_text(raw.get("summary")), None),
        ItemKind::FunctionCall => (String::new(), extract_tool_call(raw, 0)),
    };

    Some(ItemSnapshot {
        id,
        kind,
        text,
        call,
        call_id,
    })
}

/// Text of a content array, a bare string, or nested `text`/`content` fields.
pub(crate) fn collect_text(raw: Option<&Value>) -> String {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(obj) => {
                if let Some(text) = obj.get("text").and_then(Value::as_str) {
                    out.push(text.to_string());
                } else if let Some(content) = obj.get("content") {
                    walk(content, out);
                }
            }
            _ => {}
        }
    }

    let mut parts = Vec::new();
    if let Some(value) = raw {
        walk(value, &mut parts);
    }
    parts.concat()
}

fn classify_lenient(value: &Value) -> StreamEvent {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return StreamEvent::Ignored;
    };
    let item_id = || {
        value
            .get("item_id")
            .or_else(|| value.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let delta = |channel| match (item_id(), value.get("delta").and_then(Value::as_str)) {
        (Some(item_id), Some(delta)) => StreamEvent::Delta {
            item_id,
            channel,
            delta: delta.to_string(),
        },
        _ => StreamEvent::Ignored,
    };
    let response = || value.get("response").cloned().unwrap_or(Value::Null);

    if kind.ends_with(".output_item.added") {
        value
            .get("item")
            .and_then(item_from_value)
            .map_or(StreamEvent::Ignored, StreamEvent::ItemAdded)
    } else if kind.ends_with(".output_item.done") {
        value
            .get("item")
            .and_then(item_from_value)
            .map_or(StreamEvent::Ignored, StreamEvent::ItemDone)
    } else if kind.ends_with(".output_text.delta") {
        delta(DeltaChannel::Text)
    } else if kind.ends_with(".reasoning_summary_text.delta") || kind.ends_with(".reasoning_text.delta") {
        delta(DeltaChannel::Reasoning)
    } else if kind.ends_with(".function_call_arguments.delta") {
        delta(DeltaChannel::Arguments)
    } else {
        // Per-item lifecycle events (`response.web_search_call.completed`,
        // `response.mcp_call.failed`) share these suffixes; only the
        // response-level types end the stream.
        match kind {
            "response.completed" | "response.done" => StreamEvent::Terminal {
                response: response(),
                incomplete: false,
            },
            "response.incomplete" => StreamEvent::Terminal {
                response: response(),
                incomplete: true,
            },
            "error" | "response.failed" => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| failure_message(&response()), str::to_string);
                StreamEvent::Failed { message }
            }
            _ => StreamEvent::Ignored,
        }
    }
}

fn failure_message(response: &Value) -> String {
    response
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("backend reported response.failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_message_item_carries_text() {
        let event = classify(&json!({
            "type": "response.output_item.done",
            "item": { "type": "message", "id": "msg_1", "role": "assistant",
                      "content": [{ "type": "output_text", "text": "Hi" }] }
        }));
        let StreamEvent::ItemDone(item) = event else {
            panic!("expected done, got {event:?}");
        };
        assert_eq!(item.id.as_deref(), Some("msg_1"));
        assert_eq!(item.kind, ItemKind::Message);
        assert_eq!(item.text, "Hi");
    }

    #[test]
    fn nested_function_item_falls_back_to_raw_reading() {
        let event = classify(&json!({
            "type": "response.output_item.done",
            "item": { "type": "function_call", "id": "fc_1",
                      "function": { "name": "run", "arguments": "{}" } }
        }));
        let StreamEvent::ItemDone(item) = event else {
            panic!("expected done, got {event:?}");
        };
        assert_eq!(item.kind, ItemKind::FunctionCall);
        assert_eq!(item.call, Some(ToolCall::function("fc_1", "run", "{}")));
    }

    #[test]
    fn unfamiliar_prefixes_classify_by_suffix() {
        assert_eq!(
            classify(&json!({ "type": "codex.output_text.delta", "item_id": "m", "delta": "x" })),
            StreamEvent::Delta {
                item_id: "m".to_string(),
                channel: DeltaChannel::Text,
                delta: "x".to_string()
            }
        );
        // Typed parse fails on the missing item_id; the lenient path reads `id`.
        assert_eq!(
            classify(&json!({ "type": "response.output_text.delta", "id": "m", "delta": "y" })),
            StreamEvent::Delta {
                item_id: "m".to_string(),
                channel: DeltaChannel::Text,
                delta: "y".to_string()
            }
        );
    }

    #[test]
    fn lifecycle_markers_are_ignored() {
        for kind in [
            "response.created",
            "response.in_progress",
            "response.content_part.added",
            "response.reasoning_summary_part.added",
            "response.output_text.done",
        ] {
            assert_eq!(classify(&json!({ "type": kind })), StreamEvent::Ignored, "{kind}");
        }
    }

    #[test]
    fn per_item_lifecycle_events_do_not_end_the_response() {
        for kind in [
            "response.web_search_call.completed",
            "response.image_generation_call.completed",
            "response.mcp_call.failed",
            "response.file_search_call.incomplete",
        ] {
            assert_eq!(
                classify(&json!({ "type": kind, "item_id": "ws_1", "output_index": 0 })),
                StreamEvent::Ignored,
                "{kind}"
            );
        }
        assert!(matches!(
            classify(&json!({ "type": "response.done", "response": {} })),
            StreamEvent::Terminal { incomplete: false, .. }
        ));
    }

    #[test]
    fn failures_carry_backend_message() {
        assert_eq!(
            classify(&json!({ "type": "error", "code": "rate_limit_exceeded", "message": "slow down" })),
            StreamEvent::Failed {
                message: "rate_limit_exceeded: slow down".to_string()
            }
        );
        assert_eq!(
            classify(&json!({ "type": "response.failed",
                              "response": { "error": { "message": "boom" } } })),
            StreamEvent::Failed {
                message: "boom".to_string()
            }
        );
    }
}

use codex_bridge_schema::chat::ToolCall;
use serde_json::Value;
use tracing::warn;

use crate::request::arguments_string;

/// The tool-call layouts seen from the backend, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolCallShape {
    /// `{"id", "type": "function", "function": {"name", "arguments"}}`
    NestedFunction,
    /// `{"type": "function_call", "call_id", "name", "arguments"}` from an `output` array.
    OutputItem,
    /// `{"id" | "call_id", "name", "arguments"}` with no type marker.
    Flattened,
}

pub(crate) fn detect_shape(raw: &Value) -> Option<ToolCallShape> {
    let obj = raw.as_object()?;
    let has_name = |v: Option<&Value>| v.and_then(Value::as_str).is_some_and(|s| !s.is_empty());

    if let Some(function) = obj.get("function").filter(|f| f.is_object()) {
        return has_name(function.get("name")).then_some(ToolCallShape::NestedFunction);
    }
    if obj.get("type").and_then(Value::as_str) == Some("function_call") {
        return has_name(obj.get("name")).then_some(ToolCallShape::OutputItem);
    }
    if has_name(obj.get("name")) && obj.contains_key("arguments") {
        return Some(ToolCallShape::Flattened);
    }
    None
}

/// Normalize one raw tool call. `position` names the call when the payload carries no id.
pub(crate) fn extract_tool_call(raw: &Value, position: usize) -> Option<ToolCall> {
    let Some(shape) = detect_shape(raw) else {
        warn!(payload = %raw, "Unrecognized tool-call shape, skipping");
        return None;
    };

    let text = |key: &str| raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    let fallback_id = || format!("call_{position}");

    let (id, name, arguments) = match shape {
        ToolCallShape::NestedFunction => {
            let function = raw.get("function")?;
            (
                text("id").or_else(|| text("call_id")).map_or_else(fallback_id, str::to_string),
                function.get("name").and_then(Value::as_str)?,
                function.get("arguments"),
            )
        }
        ToolCallShape::OutputItem | ToolCallShape::Flattened => (
            text("call_id").or_else(|| text("id")).map_or_else(fallback_id, str::to_string),
            text("name")?,
            raw.get("arguments"),
        ),
    };

    Some(ToolCall::function(id, name, arguments_string(arguments)))
}

/// Every tool call found in a list, in order.
pub(crate) fn extract_tool_calls<'a>(raw: impl IntoIterator<Item = &'a Value>) -> Vec<ToolCall> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(position, call)| extract_tool_call(call, position))
        .collect()
}

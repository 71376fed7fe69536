use codex_bridge_schema::chat::{ChatCompletion, ToolCall};
use codex_bridge_schema::codex::CodexResponseDocument;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::events::{StreamEvent, collect_text, item_from_typed};
use super::reducer::{StreamReducer, assemble, finish_reason};
use super::tool_calls::{extract_tool_call, extract_tool_calls};
use crate::error::BridgeError;

/// Adapt a single JSON document (no event stream).
///
/// Strategies, in order: typed Codex document, relaxed chat-shaped document, then a heuristic
/// scan of any `output` array.
pub(crate) fn adapt_document(raw: &str, model: &str) -> Result<ChatCompletion, BridgeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::response_parse(format!("backend body is not JSON: {e}"), raw))?;
    let doc = value
        .get("response")
        .filter(|r| r.is_object())
        .unwrap_or(&value);

    if let Some(done) = typed_document(doc, model) {
        return Ok(done);
    }
    if let Some(done) = chat_document(doc, model) {
        debug!("Backend document adapted via chat-shaped fallback");
        return Ok(done);
    }
    if let Some(done) = scan_output(doc, model) {
        debug!("Backend document adapted via output scan");
        return Ok(done);
    }

    Err(BridgeError::response_parse(
        "backend document has neither choices nor an output array",
        raw,
    ))
}

fn typed_document(doc: &Value, model: &str) -> Option<ChatCompletion> {
    let typed = CodexResponseDocument::deserialize(doc).ok()?;
    let incomplete = typed.status.as_deref() == Some("incomplete");
    let raw_items = doc.get("output").and_then(Value::as_array);

    let state = typed
        .output
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| item_from_typed(item, raw_items.and_then(|a| a.get(index))))
        .fold(StreamReducer::new(), |state, item| {
            state.apply(StreamEvent::ItemDone(item))
        })
        .apply(StreamEvent::Terminal {
            response: doc.clone(),
            incomplete,
        });
    state.finish(model).ok()
}

/// Chat-completions shaped body: `{"choices":[{"message":{...}}]}`.
fn chat_document(doc: &Value, model: &str) -> Option<ChatCompletion> {
    let choice = doc.get("choices")?.as_array()?.first()?;
    let message = choice.get("message").unwrap_or(&Value::Null);

    let mut tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| extract_tool_calls(calls))
        .unwrap_or_default();
    if tool_calls.is_empty()
        && let Some(legacy) = message.get("function_call").filter(|f| f.is_object())
    {
        tool_calls.extend(legacy_call(legacy));
    }
    if tool_calls.is_empty() {
        tool_calls = output_calls(doc);
    }

    let content = match message.get("content") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        other => Some(collect_text(other)),
    }
    .filter(|s| !s.is_empty())
    .or_else(|| {
        tool_calls
            .is_empty()
            .then(|| collect_text(doc.get("output")))
    });
    let reasoning = message
        .get("reasoning_content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| finish_reason(&tool_calls, false, doc));

    Some(assemble(doc, model, content, reasoning, tool_calls, reason))
}

/// Last resort: read whatever `output` holds, item by item.
fn scan_output(doc: &Value, model: &str) -> Option<ChatCompletion> {
    let output = doc.get("output")?;
    let items = output.as_array().map(Vec::as_slice).unwrap_or_default();

    let tool_calls = output_calls(doc);
    let content = items
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .map(|item| collect_text(item.get("content")))
        .or_else(|| tool_calls.is_empty().then(|| collect_text(Some(output))));
    let reason = finish_reason(&tool_calls, false, doc);

    Some(assemble(doc, model, content, None, tool_calls, reason))
}

fn output_calls(doc: &Value) -> Vec<ToolCall> {
    doc.get("output")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
                .enumerate()
                .filter_map(|(position, item)| extract_tool_call(item, position))
                .collect()
        })
        .unwrap_or_default()
}

fn legacy_call(function_call: &Value) -> Option<ToolCall> {
    let name = function_call.get("name").and_then(Value::as_str)?;
    let wrapped = serde_json::json!({
        "name": name,
        "arguments": function_call.get("arguments").cloned().unwrap_or(Value::Null),
    });
    extract_tool_call(&wrapped, 0)
}

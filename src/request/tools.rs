use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::BridgeError;

/// Sampling and control options forwarded verbatim when present and non-null.
const PASSTHROUGH_KEYS: &[&str] = &[
    "frequency_penalty",
    "logprobs",
    "max_output_tokens",
    "max_tokens",
    "metadata",
    "n",
    "parallel_tool_calls",
    "presence_penalty",
    "response_format",
    "seed",
    "stop",
    "temperature",
    "tool_choice",
    "top_logprobs",
    "top_p",
    "user",
];

/// Flatten chat tool definitions into the backend's `{type, name, description, parameters}`.
///
/// Both the `{"type":"function","function":{...}}` envelope and already-flat definitions are
/// accepted. A definition without a name, or whose parameters are not an object, is rejected.
pub(crate) fn normalize_tools(tools: &[Value]) -> Result<Vec<Value>, BridgeError> {
    tools
        .iter()
        .enumerate()
        .map(|(index, tool)| normalize_tool(index, tool))
        .collect()
}

fn normalize_tool(index: usize, tool: &Value) -> Result<Value, BridgeError> {
    let Value::Object(obj) = tool else {
        return Err(BridgeError::PayloadValidation(format!(
            "tools[{index}] must be an object"
        )));
    };

    let mut flat = obj.clone();
    let kind = flat
        .remove("type")
        .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
        .unwrap_or_else(|| Value::String("function".to_string()));

    let function = match flat.remove("function") {
        Some(Value::Object(f)) if !f.is_empty() => Some(f),
        _ => None,
    };

    let source: &Map<String, Value> = function.as_ref().unwrap_or(&flat);
    let name = source
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            BridgeError::PayloadValidation(match function {
                Some(_) => format!("tools[{index}].function.name is required"),
                None => format!("tools[{index}].name is required"),
            })
        })?
        .to_string();
    let description = source.get("description").filter(|d| !d.is_null()).cloned();
    let parameters = match source.get("parameters") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(p @ Value::Object(_)) => p.clone(),
        Some(_) => {
            return Err(BridgeError::PayloadValidation(format!(
                "tools[{index}] parameters must be a JSON schema object"
            )));
        }
    };

    flat.insert("type".to_string(), kind);
    flat.insert("name".to_string(), Value::String(name));
    if let Some(description) = description {
        flat.entry("description").or_insert(description);
    }
    flat.insert("parameters".to_string(), parameters);
    Ok(Value::Object(flat))
}

/// Pick the forwarded options out of the request's extra fields.
pub(super) fn passthrough_options(extra: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut out: BTreeMap<String, Value> = extra
        .iter()
        .filter(|(k, v)| PASSTHROUGH_KEYS.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if let Some(max_tokens) = out.remove("max_tokens") {
        out.entry("max_output_tokens".to_string()).or_insert(max_tokens);
    }
    out
}

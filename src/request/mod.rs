//! Chat-completions request → Codex responses payload.

mod prompts;
mod tools;

pub use prompts::{TOOL_BRIDGE_PROMPT, TOOL_REMAP_PROMPT};

use codex_bridge_schema::{ChatCompletionRequest, ChatMessage, CodexInputItem, CodexRequestBody};
use codex_bridge_schema::codex::{Reasoning, TextControls};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::BridgeError;
use crate::instructions::DEFAULT_INSTRUCTIONS;
use crate::models::{REASONING_SUMMARY, ReasoningConfig, ModelSpec};
use crate::utils::logging::with_pretty_json_debug;
use prompts::is_toolchain_boilerplate;
use tools::passthrough_options;
pub(crate) use tools::normalize_tools;

const ENCRYPTED_REASONING_INCLUDE: &str = "reasoning.encrypted_content";

/// Per-request inputs the builder needs besides the chat request itself.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub model: &'a ModelSpec,
    pub reasoning: ReasoningConfig,
    /// Whether backend-specific instructions and the tool bridge are injected.
    pub codex_mode: bool,
    /// Family instruction text, already resolved through the instruction cache.
    pub family_instructions: Option<&'a str>,
}

/// Instructions string plus ordered input items.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedInput {
    pub instructions: String,
    pub input: Vec<CodexInputItem>,
}

/// Split system text into `instructions` and convert everything else into input items.
///
/// System text comes first, then the family instructions (Codex mode) or the tool remap prompt.
/// Empty results fall back to [`DEFAULT_INSTRUCTIONS`].
pub fn derive_input(
    messages: &[ChatMessage],
    codex_mode: bool,
    family_instructions: Option<&str>,
) -> Result<DerivedInput, BridgeError> {
    let mut system_parts: Vec<String> = Vec::new();
    let mut input = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        if message.role == "system" {
            let text = message.text_content();
            if text.trim().is_empty() {
                continue;
            }
            if codex_mode && is_toolchain_boilerplate(&text) {
                debug!(index, "Dropping toolchain system prompt");
                continue;
            }
            system_parts.push(text);
            continue;
        }
        convert_message(index, message, &mut input)?;
    }

    let base = if codex_mode {
        family_instructions
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_INSTRUCTIONS)
    } else {
        TOOL_REMAP_PROMPT
    };

    let instructions = system_parts
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(base))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(DerivedInput {
        instructions: if instructions.is_empty() {
            DEFAULT_INSTRUCTIONS.to_string()
        } else {
            instructions
        },
        input,
    })
}

/// Assemble the full backend payload.
pub fn build_request_body(
    request: &ChatCompletionRequest,
    ctx: BuildContext<'_>,
) -> Result<CodexRequestBody, BridgeError> {
    let tools = match request.tools.as_deref() {
        Some(defs) if !defs.is_empty() => Some(normalize_tools(defs)?),
        _ => None,
    };

    let DerivedInput {
        instructions,
        mut input,
    } = derive_input(&request.messages, ctx.codex_mode, ctx.family_instructions)?;

    if ctx.codex_mode && tools.is_some() {
        input.insert(0, tool_bridge_message());
    }

    let body = CodexRequestBody {
        model: ctx.model.normalized_id.clone(),
        instructions,
        input,
        tools,
        reasoning: Reasoning {
            effort: ctx.reasoning.effort.as_str().to_string(),
            summary: REASONING_SUMMARY.to_string(),
        },
        text: TextControls {
            verbosity: ctx.reasoning.verbosity.as_str().to_string(),
        },
        include: vec![ENCRYPTED_REASONING_INCLUDE.to_string()],
        store: false,
        stream: true,
        prompt_cache_key: request
            .prompt_cache_key
            .clone()
            .filter(|k| !k.trim().is_empty()),
        extra: passthrough_options(&request.extra),
    };

    with_pretty_json_debug(&body, |pretty| {
        debug!(model = %body.model, "Codex request body:\n{pretty}");
    });
    Ok(body)
}

fn tool_bridge_message() -> CodexInputItem {
    CodexInputItem::Message {
        role: "developer".to_string(),
        content: json!([{ "type": "input_text", "text": TOOL_BRIDGE_PROMPT }]),
    }
}

fn convert_message(
    index: usize,
    message: &ChatMessage,
    out: &mut Vec<CodexInputItem>,
) -> Result<(), BridgeError> {
    match message.role.as_str() {
        "tool" | "function" => {
            let call_id = message
                .tool_call_id
                .as_deref()
                .or(message.name.as_deref())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    BridgeError::PayloadValidation(format!(
                        "messages[{index}]: {} message requires tool_call_id",
                        message.role
                    ))
                })?;
            out.push(CodexInputItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: message.text_content(),
            });
        }
        "assistant" => {
            let calls = assistant_calls(index, message)?;
            let has_text = message
                .content
                .as_ref()
                .is_some_and(|c| !c.is_null() && !message.text_content().is_empty());
            if has_text || calls.is_empty() {
                out.push(CodexInputItem::Message {
                    role: message.role.clone(),
                    content: convert_content(&message.role, message.content.as_ref()),
                });
            }
            out.extend(calls);
        }
        role => out.push(CodexInputItem::Message {
            role: role.to_string(),
            content: convert_content(role, message.content.as_ref()),
        }),
    }
    Ok(())
}

/// Function-call items carried by an assistant message, `tool_calls` first, then the legacy
/// `function_call`.
fn assistant_calls(index: usize, message: &ChatMessage) -> Result<Vec<CodexInputItem>, BridgeError> {
    let mut calls = Vec::new();

    for (position, call) in message.tool_calls.iter().flatten().enumerate() {
        let function = call.get("function").filter(|f| f.is_object());
        let name = function
            .and_then(|f| f.get("name"))
            .or_else(|| call.get("name"))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                BridgeError::PayloadValidation(format!(
                    "messages[{index}].tool_calls[{position}] has no function name"
                ))
            })?;
        let arguments = function
            .and_then(|f| f.get("arguments"))
            .or_else(|| call.get("arguments"));
        let call_id = call
            .get("id")
            .or_else(|| call.get("call_id"))
            .and_then(Value::as_str)
            .map_or_else(|| format!("call_{index}_{position}"), str::to_string);

        calls.push(CodexInputItem::FunctionCall {
            call_id,
            name: name.to_string(),
            arguments: arguments_string(arguments),
        });
    }

    if let Some(legacy) = message.function_call.as_ref().filter(|f| f.is_object()) {
        let name = legacy
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                BridgeError::PayloadValidation(format!(
                    "messages[{index}].function_call has no name"
                ))
            })?;
        // Legacy results are matched back by function name.
        calls.push(CodexInputItem::FunctionCall {
            call_id: name.to_string(),
            name: name.to_string(),
            arguments: arguments_string(legacy.get("arguments")),
        });
    }

    Ok(calls)
}

pub(crate) fn arguments_string(arguments: Option<&Value>) -> String {
    match arguments {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Chat content → backend content. Strings pass through; typed parts are renamed.
fn convert_content(role: &str, content: Option<&Value>) -> Value {
    let text_kind = if role == "assistant" {
        "output_text"
    } else {
        "input_text"
    };

    match content {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Array(parts)) => Value::Array(
            parts
                .iter()
                .map(|part| convert_part(text_kind, part))
                .collect(),
        ),
        Some(Value::Object(obj)) => Value::String(
            obj.get("text")
                .or_else(|| obj.get("content"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        Some(other) => Value::String(other.to_string()),
    }
}

fn convert_part(text_kind: &str, part: &Value) -> Value {
    match part.get("type").and_then(Value::as_str) {
        Some("text") => json!({
            "type": text_kind,
            "text": part.get("text").and_then(Value::as_str).unwrap_or_default(),
        }),
        Some("image_url") => {
            let url = part
                .get("image_url")
                .and_then(|img| img.get("url").or(Some(img)))
                .and_then(Value::as_str)
                .unwrap_or_default();
            json!({ "type": "input_image", "image_url": url })
        }
        _ => match part {
            Value::String(s) => json!({ "type": text_kind, "text": s }),
            other => other.clone(),
        },
    }
}

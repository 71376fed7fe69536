use chrono::Utc;
use codex_bridge_schema::chat::{AssistantMessage, ChatChoice, ChatCompletion, ChatUsage, ToolCall};
use codex_bridge_schema::codex::CodexUsage;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::events::{DeltaChannel, ItemKind, ItemSnapshot, StreamEvent, item_from_value};
use crate::error::BridgeError;

/// Streaming buffer for one item between `added` and `done`.
#[derive(Debug, Clone)]
struct ItemAccumulator {
    kind: ItemKind,
    text: String,
    call_id: Option<String>,
    name: Option<String>,
}

/// A finalized item, in the order it was finalized.
#[derive(Debug, Clone, PartialEq)]
enum Finalized {
    Message { item_id: Option<String>, text: String },
    Reasoning { item_id: Option<String>, text: String },
    ToolCall { item_id: Option<String>, call: ToolCall },
}

impl Finalized {
    fn item_id(&self) -> Option<&str> {
        match self {
            Self::Message { item_id, .. }
            | Self::Reasoning { item_id, .. }
            | Self::ToolCall { item_id, .. } => item_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Terminal {
    Completed { response: Value, incomplete: bool },
    Failed { message: String },
}

/// Event-stream state machine: `(state, event) -> state`, read out once terminal.
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamReducer {
    open: HashMap<String, ItemAccumulator>,
    finalized: Vec<Finalized>,
    terminal: Option<Terminal>,
}

impl StreamReducer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub(crate) fn apply(mut self, event: StreamEvent) -> Self {
        if self.is_terminal() {
            return self;
        }

        match event {
            StreamEvent::ItemAdded(item) => {
                if let Some(id) = item.id.clone() {
                    self.open.insert(
                        id,
                        ItemAccumulator {
                            kind: item.kind,
                            text: String::new(),
                            call_id: item.call_id,
                            name: item.call.map(|c| c.function.name),
                        },
                    );
                }
            }
            StreamEvent::Delta {
                item_id,
                channel,
                delta,
            } => match self.open.get_mut(&item_id) {
                Some(acc) if channel_fits(acc.kind, channel) => acc.text.push_str(&delta),
                Some(_) => debug!(item_id = %item_id, ?channel, "Delta for mismatched item kind dropped"),
                None => debug!(item_id = %item_id, "Delta for unknown item dropped"),
            },
            StreamEvent::ItemDone(item) => self.finalize(item),
            StreamEvent::Terminal {
                response,
                incomplete,
            } => self.terminal = Some(Terminal::Completed { response, incomplete }),
            StreamEvent::Failed { message } => self.terminal = Some(Terminal::Failed { message }),
            StreamEvent::Ignored => {}
        }
        self
    }

    fn finalize(&mut self, item: ItemSnapshot) {
        let acc = item.id.as_deref().and_then(|id| self.open.remove(id));
        let buffered = acc.as_ref().map(|a| a.text.as_str()).unwrap_or_default();
        let pick_text = |text: String| if text.is_empty() { buffered.to_string() } else { text };

        let done = match item.kind {
            ItemKind::Message => Finalized::Message {
                item_id: item.id,
                text: pick_text(item.text),
            },
            ItemKind::Reasoning => Finalized::Reasoning {
                item_id: item.id,
                text: pick_text(item.text),
            },
            ItemKind::FunctionCall => {
                let Some(call) = finalized_call(&item, acc.as_ref()) else {
                    debug!(item_id = ?item.id, "Function call finished without a name, dropped");
                    return;
                };
                Finalized::ToolCall {
                    item_id: item.id,
                    call,
                }
            }
        };

        // A repeated id replaces the earlier result in place.
        let existing = done
            .item_id()
            .and_then(|id| self.finalized.iter().position(|f| f.item_id() == Some(id)));
        match existing {
            Some(index) => self.finalized[index] = done,
            None => self.finalized.push(done),
        }
    }

    /// Assemble the unified response. A stream that ends without a terminal event is read
    /// out as if it had completed.
    pub(crate) fn finish(self, model: &str) -> Result<ChatCompletion, BridgeError> {
        let (response, incomplete) = match self.terminal {
            Some(Terminal::Failed { message }) => return Err(BridgeError::BackendStream(message)),
            Some(Terminal::Completed {
                response,
                incomplete,
            }) => (response, incomplete),
            None => (Value::Null, false),
        };

        // A terminal response may carry the whole output without any item events.
        let finalized = if self.finalized.is_empty() {
            finalized_from_output(&response)
        } else {
            self.finalized
        };

        let mut content: Option<String> = None;
        let mut reasoning: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        for item in finalized {
            match item {
                Finalized::Message { text, .. } => {
                    content.get_or_insert(text);
                }
                Finalized::Reasoning { text, .. } if !text.is_empty() => reasoning.push(text),
                Finalized::Reasoning { .. } => {}
                Finalized::ToolCall { call, .. } => tool_calls.push(call),
            }
        }

        let finish_reason = finish_reason(&tool_calls, incomplete, &response);
        Ok(assemble(
            &response,
            model,
            content,
            (!reasoning.is_empty()).then(|| reasoning.join("\n\n")),
            tool_calls,
            finish_reason,
        ))
    }
}

fn finalized_from_output(response: &Value) -> Vec<Finalized> {
    let Some(output) = response.get("output").and_then(Value::as_array) else {
        return Vec::new();
    };
    output
        .iter()
        .filter_map(item_from_value)
        .fold(StreamReducer::new(), |state, item| {
            state.apply(StreamEvent::ItemDone(item))
        })
        .finalized
}

fn channel_fits(kind: ItemKind, channel: DeltaChannel) -> bool {
    matches!(
        (kind, channel),
        (ItemKind::Message, DeltaChannel::Text)
            | (ItemKind::Reasoning, DeltaChannel::Reasoning)
            | (ItemKind::FunctionCall, DeltaChannel::Arguments)
    )
}

/// Done payload first, then whatever the accumulator saw.
fn finalized_call(item: &ItemSnapshot, acc: Option<&ItemAccumulator>) -> Option<ToolCall> {
    let buffered_args = acc.map(|a| a.text.as_str()).filter(|s| !s.is_empty());
    let call_id = item
        .call_id
        .clone()
        .or_else(|| acc.and_then(|a| a.call_id.clone()));

    match item.call.clone() {
        Some(mut call) => {
            if let Some(call_id) = call_id {
                call.id = call_id;
            }
            if call.function.arguments == "{}"
                && let Some(args) = buffered_args
            {
                call.function.arguments = args.to_string();
            }
            Some(call)
        }
        None => {
            let name = acc.and_then(|a| a.name.clone())?;
            Some(ToolCall::function(
                call_id.or_else(|| item.id.clone()).unwrap_or_default(),
                name,
                buffered_args.unwrap_or("{}"),
            ))
        }
    }
}

pub(super) fn finish_reason(tool_calls: &[ToolCall], incomplete: bool, response: &Value) -> String {
    if !tool_calls.is_empty() {
        return "tool_calls".to_string();
    }
    let truncated = response
        .pointer("/incomplete_details/reason")
        .and_then(Value::as_str)
        .is_some_and(|r| r.contains("max_output_tokens") || r.contains("max_tokens"));
    if incomplete && truncated {
        "length".to_string()
    } else {
        "stop".to_string()
    }
}

pub(super) fn usage_from(response: &Value) -> ChatUsage {
    let usage = response
        .get("usage")
        .and_then(|u| serde_json::from_value::<CodexUsage>(u.clone()).ok())
        .unwrap_or_default();
    ChatUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total(),
    }
}

/// Build the single-choice completion, taking id/model/created from the backend response
/// when it names them.
pub(super) fn assemble(
    response: &Value,
    model: &str,
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    finish_reason: String,
) -> ChatCompletion {
    let id = response
        .get("id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()), str::to_string);
    let created = response
        .get("created_at")
        .or_else(|| response.get("created"))
        .and_then(Value::as_i64)
        .unwrap_or_else(|| Utc::now().timestamp());
    let model = response
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(model)
        .to_string();

    let content = match content {
        Some(text) if !(text.is_empty() && !tool_calls.is_empty()) => Some(text),
        Some(_) => None,
        None if tool_calls.is_empty() => Some(String::new()),
        None => None,
    };

    ChatCompletion {
        id,
        object: "chat.completion".to_string(),
        created,
        model,
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                reasoning_content,
            },
            finish_reason: Some(finish_reason),
        }],
        usage: usage_from(response),
    }
}

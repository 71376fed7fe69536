mod codex_error;
mod codex_event;
mod codex_output;
mod codex_request;

pub use codex_error::{CodexErrorBody, CodexErrorObject};
pub use codex_event::CodexStreamEvent;
pub use codex_output::{CodexContentPart, CodexOutputItem, CodexResponseDocument, CodexUsage};
pub use codex_request::{CodexInputItem, CodexRequestBody, Reasoning, TextControls};

pub mod chat;
pub mod codex;

pub use chat::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChatErrorBody, ChatErrorObject,
    ChatMessage, ModelList,
};
pub use codex::{CodexErrorBody, CodexInputItem, CodexRequestBody, CodexStreamEvent};

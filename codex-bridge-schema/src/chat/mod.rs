mod chat_error;
mod chat_request;
mod chat_response;
mod model_list;

pub use chat_error::{ChatErrorBody, ChatErrorObject};
pub use chat_request::{ChatCompletionRequest, ChatMessage};
pub use chat_response::{
    AssistantMessage, ChatChoice, ChatCompletion, ChatCompletionChunk, ChatUsage, ChunkChoice,
    ChunkDelta, ChunkToolCall, FunctionCall, ToolCall,
};
pub use model_list::{ModelEntry, ModelList};

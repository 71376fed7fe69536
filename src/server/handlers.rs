use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use codex_bridge_schema::{ChatCompletionRequest, ModelList};
use futures::{StreamExt, stream};
use tracing::debug;

use super::router::BridgeState;
use crate::error::BridgeError;

/// Terminator line every chat-completions stream ends with.
const STREAM_DONE: &str = "[DONE]";

pub(super) async fn chat_completions_handler(
    State(state): State<BridgeState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, BridgeError> {
    let Json(request) = payload?;

    debug!(
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.as_ref().map_or(0, Vec::len),
        stream = request.stream,
        "Incoming chat completion"
    );

    if request.stream {
        let chunks = state.adapter.completion_stream(&request).await?;
        let events = chunks
            .map(|chunk| Event::default().json_data(chunk))
            .chain(stream::once(async {
                Ok(Event::default().data(STREAM_DONE))
            }));
        Ok(Sse::new(events).into_response())
    } else {
        let completion = state.adapter.completion(&request).await?;
        Ok(Json(completion).into_response())
    }
}

pub(super) async fn models_handler(State(state): State<BridgeState>) -> Json<ModelList> {
    Json(state.models.as_ref().clone())
}

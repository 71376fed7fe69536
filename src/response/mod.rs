//! Backend output → unified chat completion.
//!
//! The event stream is folded through an explicit reducer. Bodies that are not an event
//! stream go through the document fallbacks.

mod events;
mod fallback;
mod reducer;
mod sse;
mod tool_calls;

pub(crate) use sse::SSE_IDLE_TIMEOUT;

use axum::body::Bytes;
use codex_bridge_schema::chat::ChatCompletion;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use crate::error::BridgeError;

/// Adapt a successful backend response, streamed or buffered.
pub async fn adapt_response(
    response: reqwest::Response,
    model: &str,
    idle_timeout: Duration,
) -> Result<ChatCompletion, BridgeError> {
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/event-stream"));

    if is_event_stream {
        return sse::reduce_event_stream(response.bytes_stream(), model, idle_timeout).await;
    }

    let body = response.text().await?;
    adapt_body(&body, model).await
}

/// Adapt an already-buffered body: SSE text is sniffed, anything else is a JSON document.
pub async fn adapt_body(body: &str, model: &str) -> Result<ChatCompletion, BridgeError> {
    if sse::looks_like_sse(body) {
        debug!("Buffered backend body sniffed as SSE");
        let chunk = Bytes::from(body.to_string());
        let stream = futures::stream::iter([Ok::<_, std::convert::Infallible>(chunk)]);
        return sse::reduce_event_stream(stream, model, SSE_IDLE_TIMEOUT).await;
    }
    fallback::adapt_document(body, model)
}

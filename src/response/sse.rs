use axum::body::Bytes;
use codex_bridge_schema::chat::ChatCompletion;
use eventsource_stream::Eventsource;
use futures::Stream;
use serde_json::Value;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error};

use super::events::classify;
use super::reducer::StreamReducer;
use crate::error::BridgeError;

pub(crate) const SSE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const DONE_SENTINEL: &str = "[DONE]";

/// Drive a backend event stream through the reducer until a terminal event, the `[DONE]`
/// sentinel, or end of stream.
pub(crate) async fn reduce_event_stream<S, E>(
    stream: S,
    model: &str,
    idle_timeout: Duration,
) -> Result<ChatCompletion, BridgeError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let timed_stream = stream.eventsource().timeout(idle_timeout);
    tokio::pin!(timed_stream);

    let mut state = StreamReducer::new();
    let mut seen_events = 0usize;
    let mut last_unparsed: Option<String> = None;

    while let Some(item) = timed_stream.next().await {
        let event = match item {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => return Err(BridgeError::BackendStream(e.to_string())),
            Err(_) => {
                error!(?idle_timeout, "Codex event stream went idle");
                return Err(BridgeError::BackendStream("stream idle timeout".to_string()));
            }
        };

        let data = event.data.trim();
        if data.is_empty() {
            continue;
        }
        if data == DONE_SENTINEL {
            break;
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping non-JSON stream event");
                last_unparsed = Some(data.to_string());
                continue;
            }
        };

        seen_events += 1;
        state = state.apply(classify(&value));
        if state.is_terminal() {
            break;
        }
    }

    if seen_events == 0 {
        return Err(BridgeError::response_parse(
            "event stream carried no JSON events",
            last_unparsed.as_deref().unwrap_or_default(),
        ));
    }
    debug!(events = seen_events, "Codex event stream reduced");
    state.finish(model)
}

/// Whether a buffered body is SSE text rather than a JSON document.
pub(crate) fn looks_like_sse(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with("event:") || head.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    async fn reduce(chunks: &[&'static str]) -> Result<ChatCompletion, BridgeError> {
        let stream = stream::iter(
            chunks
                .iter()
                .map(|c| Ok::<_, Infallible>(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        );
        reduce_event_stream(stream, "gpt-5.1-codex", SSE_IDLE_TIMEOUT).await
    }

    const TEXT_STREAM: &str = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{}}\n\n",
        "event: response.output_item.added\n",
        "data: {\"type\":\"response.output_item.added\",\"item\":{\"type\":\"message\",\"id\":\"m1\"}}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"m1\",\"delta\":\"Hi \"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"m1\",\"delta\":\"there\"}\n\n",
        "data: {\"type\":\"response.output_item.done\",\"item\":{\"type\":\"message\",\"id\":\"m1\"}}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"usage\":{\"input_tokens\":3,\"output_tokens\":2}}}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn chunk_boundaries_do_not_matter() {
        let whole = reduce(&[TEXT_STREAM]).await.expect("whole");
        let (a, b) = TEXT_STREAM.split_at(97);
        let split = reduce(&[a, b]).await.expect("split");

        for out in [&whole, &split] {
            assert_eq!(out.first_message().and_then(|m| m.content.as_deref()), Some("Hi there"));
            assert_eq!(out.usage.total_tokens, 5);
        }
    }

    #[tokio::test]
    async fn stream_without_terminal_event_still_yields_result() {
        let out = reduce(&[concat!(
            "data: {\"type\":\"response.output_item.done\",\"item\":{\"type\":\"message\",\"id\":\"m\",",
            "\"content\":[{\"type\":\"output_text\",\"text\":\"cut short\"}]}}\n\n",
        )])
        .await
        .expect("completion");
        assert_eq!(out.first_message().and_then(|m| m.content.as_deref()), Some("cut short"));
    }

    #[tokio::test]
    async fn garbage_only_stream_is_a_parse_error() {
        let err = reduce(&["data: not json\n\n", "data: [DONE]\n\n"])
            .await
            .expect_err("should fail");
        assert!(matches!(err, BridgeError::ResponseParse { ref raw, .. } if raw == "not json"));
    }

    #[tokio::test]
    async fn idle_stream_times_out() {
        let stalled = stream::pending::<Result<Bytes, Infallible>>();
        let err = reduce_event_stream(stalled, "m", Duration::from_millis(20))
            .await
            .expect_err("timeout");
        assert!(matches!(err, BridgeError::BackendStream(ref m) if m.contains("idle")));
    }

    #[test]
    fn sniffing_recognizes_sse_text() {
        assert!(looks_like_sse("\n event: x\ndata: {}"));
        assert!(looks_like_sse("data: {}"));
        assert!(!looks_like_sse("{\"output\":[]}"));
    }
}

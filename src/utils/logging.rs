use serde::Serialize;

/// Pretty-print `value` for a DEBUG log line; serialization is skipped when DEBUG is off.
pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

/// Truncate `raw` to at most `max_chars` characters for log and error previews.
pub(crate) fn preview(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...<truncated>", &raw[..idx]),
        None => raw.to_string(),
    }
}

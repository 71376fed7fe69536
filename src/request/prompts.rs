/// Lower-cased markers of toolchain boilerplate dropped from system text in Codex mode.
const TOOLCHAIN_MARKERS: &[&str] = &["toolchain system prompt", "toolchain::system", "legacy toolchain"];

/// Base instruction used when family instructions are disabled.
pub const TOOL_REMAP_PROMPT: &str = "Tool remapping: emit tool calls using the provided OpenAI tool schema even if previous instructions referenced legacy tool shims.";

/// Developer message prepended when the caller supplies tools in Codex mode.
pub const TOOL_BRIDGE_PROMPT: &str = "# Codex Tool Bridge\n\n\
You are an open-source AI coding assistant with tool support, running behind a developer CLI. \
When tools are provided, prefer invoking them via standard OpenAI tool calls, using the provided \
tool schema exactly. Do not fabricate results; issue tool calls whenever they are needed to \
satisfy the request.";

pub(super) fn is_toolchain_boilerplate(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TOOLCHAIN_MARKERS.iter().any(|m| lowered.contains(m))
}

//! Model-name canonicalization.
//!
//! Callers spell models many ways (`codex/gpt-5-codex-high`, `GPT-5.1`, ...). Everything here
//! is table-driven: a new model or alias is a new row, not new code.

mod reasoning;

pub use reasoning::{
    REASONING_SUMMARY, ReasoningConfig, ReasoningEffort, Verbosity, resolve_reasoning,
};

/// Canonical backend identifiers.
pub const CANONICAL_MODELS: &[&str] = &[
    "gpt-5.1-codex",
    "gpt-5.1-codex-max",
    "gpt-5.1-codex-mini",
    "gpt-5.1",
];

/// Namespace prefixes a host may put in front of the model, longest first.
const PROVIDER_PREFIXES: &[&str] = &["codex-oauth/", "codex/", "codex-"];

/// Legacy spellings, many-to-one. Keys are lowercase.
const ALIASES: &[(&str, &str)] = &[
    ("gpt-5-codex", "gpt-5.1-codex"),
    ("gpt-5-codex-max", "gpt-5.1-codex-max"),
    ("gpt-5-codex-mini", "gpt-5.1-codex-mini"),
    ("gpt-5", "gpt-5.1"),
];

/// Family patterns matched against the lowercase resolved name, most specific first.
const FAMILY_PATTERNS: &[(&str, ModelFamily)] = &[
    ("gpt-5.1-codex-max", ModelFamily::CodexMax),
    ("gpt-5.1-codex-mini", ModelFamily::CodexMini),
    ("gpt-5.1-codex", ModelFamily::Codex),
    ("gpt-5.1", ModelFamily::Base),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Codex,
    CodexMax,
    CodexMini,
    Base,
    Other,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::Codex,
        ModelFamily::CodexMax,
        ModelFamily::CodexMini,
        ModelFamily::Base,
        ModelFamily::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::Codex => "codex",
            ModelFamily::CodexMax => "codex-max",
            ModelFamily::CodexMini => "codex-mini",
            ModelFamily::Base => "gpt-5.1",
            ModelFamily::Other => "other",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub normalized_id: String,
    pub family: ModelFamily,
    pub requested_effort: Option<ReasoningEffort>,
}

/// Canonicalize a caller-supplied model name. Total: unknown names pass through.
pub fn normalize(model: &str) -> ModelSpec {
    let cleaned = strip_provider_prefix(model);
    let lowered = cleaned.to_ascii_lowercase();
    let (base, requested_effort) = split_effort_suffix(&lowered);

    let normalized_id = resolve_alias(base).map_or_else(|| cleaned.to_string(), str::to_string);
    let family = classify(&normalized_id);

    ModelSpec {
        normalized_id,
        family,
        requested_effort,
    }
}

fn strip_provider_prefix(model: &str) -> &str {
    let model = model.trim();
    PROVIDER_PREFIXES
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
        .map_or(model, str::trim)
}

fn split_effort_suffix(lowered: &str) -> (&str, Option<ReasoningEffort>) {
    ReasoningEffort::BY_SUFFIX_LENGTH
        .iter()
        .find_map(|effort| {
            lowered
                .strip_suffix(effort.as_str())
                .and_then(|rest| rest.strip_suffix('-'))
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest, Some(*effort)))
        })
        .unwrap_or((lowered, None))
}

fn resolve_alias(base: &str) -> Option<&'static str> {
    CANONICAL_MODELS
        .iter()
        .copied()
        .find(|canonical| *canonical == base)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == base)
                .map(|(_, canonical)| *canonical)
        })
}

fn classify(name: &str) -> ModelFamily {
    let lowered = name.to_ascii_lowercase();
    FAMILY_PATTERNS
        .iter()
        .find(|(pattern, _)| lowered.starts_with(pattern))
        .map_or(ModelFamily::Other, |(_, family)| *family)
}

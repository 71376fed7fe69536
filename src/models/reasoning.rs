use serde_json::Value;

use super::{ModelFamily, ModelSpec};

/// Reasoning effort, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    XHigh,
}

impl ReasoningEffort {
    /// Longest names first so suffix matching never reads `xhigh` as `high`.
    pub(super) const BY_SUFFIX_LENGTH: [ReasoningEffort; 6] = [
        ReasoningEffort::Minimal,
        ReasoningEffort::Medium,
        ReasoningEffort::XHigh,
        ReasoningEffort::High,
        ReasoningEffort::None,
        ReasoningEffort::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::None => "none",
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::XHigh => "xhigh",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(ReasoningEffort::None),
            "minimal" => Some(ReasoningEffort::Minimal),
            "low" => Some(ReasoningEffort::Low),
            "medium" => Some(ReasoningEffort::Medium),
            "high" => Some(ReasoningEffort::High),
            "xhigh" => Some(ReasoningEffort::XHigh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Low,
    #[default]
    Medium,
    High,
}

impl Verbosity {
    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::Low => "low",
            Verbosity::Medium => "medium",
            Verbosity::High => "high",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Verbosity::Low),
            "medium" => Some(Verbosity::Medium),
            "high" => Some(Verbosity::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningConfig {
    pub effort: ReasoningEffort,
    pub verbosity: Verbosity,
}

/// Summary mode requested alongside every effort.
pub const REASONING_SUMMARY: &str = "auto";

const DEFAULT_EFFORT: ReasoningEffort = ReasoningEffort::Medium;

/// Per-family effort window. Efforts below `floor` are raised to it, above `ceiling` capped.
struct FamilyLimits {
    floor: Option<ReasoningEffort>,
    ceiling: ReasoningEffort,
}

const fn limits(family: ModelFamily) -> FamilyLimits {
    match family {
        ModelFamily::CodexMax => FamilyLimits {
            floor: None,
            ceiling: ReasoningEffort::XHigh,
        },
        ModelFamily::Codex => FamilyLimits {
            floor: Some(ReasoningEffort::Low),
            ceiling: ReasoningEffort::High,
        },
        ModelFamily::CodexMini => FamilyLimits {
            floor: Some(ReasoningEffort::Medium),
            ceiling: ReasoningEffort::High,
        },
        ModelFamily::Base | ModelFamily::Other => FamilyLimits {
            floor: None,
            ceiling: ReasoningEffort::High,
        },
    }
}

fn clamp(family: ModelFamily, effort: ReasoningEffort) -> ReasoningEffort {
    let FamilyLimits { floor, ceiling } = limits(family);
    let raised = floor.map_or(effort, |floor| effort.max(floor));
    raised.min(ceiling)
}

/// Explicit effort from the caller: a string, or an object carrying `effort`.
///
/// Returns `None` when the caller said nothing usable about effort. A present but
/// unrecognized value resolves to the default rather than falling through to the model suffix.
fn explicit_effort(raw: Option<&Value>) -> Option<ReasoningEffort> {
    let text = match raw? {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("effort")?.as_str()?,
        _ => return None,
    };
    Some(ReasoningEffort::parse(text).unwrap_or(DEFAULT_EFFORT))
}

/// Effort and verbosity for one request.
///
/// Precedence: explicit caller effort, then the model-name suffix, then `medium`. The family
/// window is applied last.
pub fn resolve_reasoning(
    model: &ModelSpec,
    effort: Option<&Value>,
    verbosity: Option<&str>,
) -> ReasoningConfig {
    let requested = explicit_effort(effort)
        .or(model.requested_effort)
        .unwrap_or(DEFAULT_EFFORT);

    ReasoningConfig {
        effort: clamp(model.family, requested),
        verbosity: verbosity.and_then(Verbosity::parse).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize;
    use serde_json::json;

    fn resolve(model: &str, effort: Option<Value>) -> ReasoningEffort {
        resolve_reasoning(&normalize(model), effort.as_ref(), None).effort
    }

    #[test]
    fn precedence_explicit_then_suffix_then_default() {
        assert_eq!(resolve("gpt-5.1-codex-low", Some(json!("high"))), ReasoningEffort::High);
        assert_eq!(resolve("gpt-5.1-codex-low", None), ReasoningEffort::Low);
        assert_eq!(resolve("gpt-5.1-codex", None), ReasoningEffort::Medium);
    }

    #[test]
    fn explicit_effort_accepts_object_form_and_any_case() {
        assert_eq!(
            resolve("gpt-5.1", Some(json!({ "effort": "LOW" }))),
            ReasoningEffort::Low
        );
    }

    #[test]
    fn unrecognized_explicit_effort_falls_back_to_medium() {
        assert_eq!(resolve("gpt-5.1-high", Some(json!("turbo"))), ReasoningEffort::Medium);
    }

    #[test]
    fn mini_raises_weak_efforts_and_caps_xhigh() {
        for weak in ["none", "minimal", "low"] {
            assert_eq!(
                resolve("gpt-5.1-codex-mini", Some(json!(weak))),
                ReasoningEffort::Medium
            );
        }
        assert_eq!(resolve("gpt-5.1-codex-mini-xhigh", None), ReasoningEffort::High);
    }

    #[test]
    fn codex_raises_below_low() {
        assert_eq!(resolve("gpt-5-codex-minimal", None), ReasoningEffort::Low);
        assert_eq!(resolve("gpt-5-codex-none", None), ReasoningEffort::Low);
        assert_eq!(resolve("gpt-5-codex-xhigh", None), ReasoningEffort::High);
    }

    #[test]
    fn only_codex_max_keeps_xhigh() {
        assert_eq!(resolve("gpt-5.1-codex-max-xhigh", None), ReasoningEffort::XHigh);
        assert_eq!(resolve("gpt-5.1-xhigh", None), ReasoningEffort::High);
        assert_eq!(resolve("some-model-xhigh", None), ReasoningEffort::High);
        assert_eq!(resolve("gpt-5.1-none", None), ReasoningEffort::None);
    }

    #[test]
    fn verbosity_defaults_to_medium() {
        let spec = normalize("gpt-5.1");
        assert_eq!(resolve_reasoning(&spec, None, None).verbosity, Verbosity::Medium);
        assert_eq!(
            resolve_reasoning(&spec, None, Some("HIGH")).verbosity,
            Verbosity::High
        );
        assert_eq!(
            resolve_reasoning(&spec, None, Some("loud")).verbosity,
            Verbosity::Medium
        );
    }

    #[test]
    fn clamping_is_total_over_the_table() {
        for family in ModelFamily::ALL {
            for effort in ReasoningEffort::BY_SUFFIX_LENGTH {
                let out = clamp(family, effort);
                assert!(out <= limits(family).ceiling);
                assert_eq!(clamp(family, out), out);
            }
        }
    }
}

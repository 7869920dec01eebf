use std::sync::OnceLock;

use agent_provider::ReasoningEffort;
use regex::Regex;

fn low_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"(?i)low").expect("low regex must compile"))
}

fn high_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"(?i)high").expect("high regex must compile"))
}

fn sentence_break_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("sentence regex must compile"))
}

/// Reads the triage model's answer. Ambiguous or empty answers are medium.
#[must_use]
pub fn classify(answer: &str) -> ReasoningEffort {
    match (low_regex().is_match(answer), high_regex().is_match(answer)) {
        (true, false) => ReasoningEffort::Low,
        (false, true) => ReasoningEffort::High,
        _ => ReasoningEffort::Medium,
    }
}

#[must_use]
pub fn is_single_sentence(request: &str) -> bool {
    sentence_break_regex()
        .split(request.trim())
        .filter(|sentence| !sentence.trim().is_empty())
        .count()
        <= 1
}

/// A one-sentence request is never rated high.
#[must_use]
pub fn apply_guardrail(request: &str, effort: ReasoningEffort) -> ReasoningEffort {
    if effort == ReasoningEffort::High && is_single_sentence(request) {
        ReasoningEffort::Medium
    } else {
        effort
    }
}

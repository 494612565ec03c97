//! Guardrail rule set: injection signatures and toxicity word lists.
//!
//! The tables are immutable. Injection patterns are compiled once on first use; toxicity terms are
//! plain substrings of the lower-cased text.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use super::{InjectionCheck, ToxicityCheck, ToxicityLevel};

/// Texts shorter than this (in characters, after trimming) are never flagged as injection.
pub const MIN_INJECTION_LENGTH: usize = 10;

pub const TOXICITY_REASON: &str = "Detected language that may be unprofessional or harassing.";

/// Ordered (pattern, reason) pairs. The first match wins.
const INJECTION_RULES: &[(&str, &str)] = &[
    (r"ignore\s+(all\s+)?(previous|above|prior)\s+instructions?", "Instruction override"),
    (r"disregard\s+(your\s+)?(instructions?|system\s+prompt)", "Instruction override"),
    (r"you\s+are\s+now\s+", "Role reassignment"),
    (r"act\s+as\s+(if\s+)?(you\s+are\s+)?", "Role reassignment"),
    (r"pretend\s+(to\s+be|you\s+are)", "Role reassignment"),
    (r"system\s*:\s*|\[system\]|<\s*system\s*>", "System prompt injection"),
    (r"\[/?INST\]", "Prompt format injection"),
    (r"jailbreak|bypass\s+(your\s+)?(safety|restrictions)", "Jailbreak attempt"),
    (
        r"reveal\s+(your\s+)?(system\s+)?prompt|show\s+(me\s+)?(your\s+)?instructions?",
        "Prompt extraction",
    ),
    (r"new\s+instructions?\s*:\s*", "Instruction injection"),
    (r"human\s*:\s*.*(assistant|ai)\s*:\s*", "Dialogue injection"),
    (r"<\s*/?\s*system\s*>", "XML-style injection"),
];

pub const TOXICITY_HIGH: &[&str] = &[
    "kill",
    "murder",
    "rape",
    "abuse",
    "threat",
    "threaten",
    "harass",
    "harassment",
    "hate you",
    "hate speech",
    "slur",
    "racist",
    "sexist",
    "violent",
];

pub const TOXICITY_MEDIUM: &[&str] = &[
    "stupid",
    "idiot",
    "dumb",
    "worthless",
    "pathetic",
    "shut up",
    "disgusting",
    "hate",
    "terrible person",
    "worst",
    "ugly",
    "fat",
];

pub const TOXICITY_LOW: &[&str] = &["bad", "suck", "sucks", "annoying", "ridiculous"];

fn injection_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        INJECTION_RULES
            .iter()
            .map(|(pattern, reason)| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("injection pattern is valid");
                (regex, *reason)
            })
            .collect()
    })
}

const TOXICITY_TIERS: [(ToxicityLevel, &[&str]); 3] = [
    (ToxicityLevel::High, TOXICITY_HIGH),
    (ToxicityLevel::Medium, TOXICITY_MEDIUM),
    (ToxicityLevel::Low, TOXICITY_LOW),
];

pub fn detect_prompt_injection(text: &str) -> InjectionCheck {
    let normalized = text.trim();
    if normalized.chars().count() < MIN_INJECTION_LENGTH {
        return InjectionCheck::clean();
    }

    injection_rules()
        .iter()
        .find(|(regex, _)| regex.is_match(normalized))
        .map(|(_, reason)| InjectionCheck::detected(reason))
        .unwrap_or_else(InjectionCheck::clean)
}

/// Substring match on the lower-cased text, so inflected forms ("idiots", "harassed") hit
/// their stem. Highest tier wins: a text holding both a high and a low term is high.
pub fn detect_toxicity(text: &str) -> ToxicityCheck {
    let lower = text.to_lowercase();
    TOXICITY_TIERS
        .iter()
        .find(|(_, terms)| terms.iter().any(|term| lower.contains(term)))
        .map(|(level, _)| ToxicityCheck {
            level: *level,
            reason: Some(TOXICITY_REASON.to_string()),
        })
        .unwrap_or_default()
}

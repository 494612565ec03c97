//! Guardrail Evaluator: content-safety checks on candidate speech.
//!
//! Two heuristics run over candidate text: prompt-injection signatures and toxicity word lists.
//! Both are pure and never fail; an unmatched text is a clean result, not an error. The
//! [`GuardrailEvaluator`] applies them to a single utterance or a whole transcript and decides
//! whether the session has to be terminated:
//!
//! - any injection terminates (zero tolerance)
//! - toxicity terminates only when it is high and the organisation asks for it
//!
//! Violation details are for the admin/audit view. Candidates only ever see the non-specific
//! [`RealtimeVerdict`] reason.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod evaluator;
pub mod policy;
pub mod rules;

pub use evaluator::{
    GuardrailEvaluator, InjectionDetector, KeywordToxicityDetector, PatternInjectionDetector, ToxicityDetector,
};
pub use policy::{EEO_DEFAULT_TOPICS, OrgGuardrails, build_do_not_ask_instruction};
pub use rules::{detect_prompt_injection, detect_toxicity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToxicityLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ToxicityLevel {
    /// Severity of a toxicity violation at this level; `None` is not a violation.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            ToxicityLevel::None => None,
            ToxicityLevel::Low => Some(Severity::Low),
            ToxicityLevel::Medium => Some(Severity::Medium),
            ToxicityLevel::High => Some(Severity::High),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    PromptInjection,
    Toxicity,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::PromptInjection => "prompt_injection",
            ViolationType::Toxicity => "toxicity",
        }
    }
}

/// Speaker of a transcript turn. Only candidate (`user`) turns are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript turn. Its ordinal is its position in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TranscriptTurn {
    pub role: Role,
    #[serde(default)]
    pub text: String,
}

impl TranscriptTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InjectionCheck {
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InjectionCheck {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn detected(reason: &str) -> Self {
        Self {
            detected: true,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ToxicityCheck {
    pub level: ToxicityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Both detector results for one text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GuardrailCheck {
    pub prompt_injection: InjectionCheck,
    pub toxicity: ToxicityCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GuardrailViolation {
    pub turn_index: usize,
    pub role: Role,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub reason: String,
}

/// Outcome of a transcript evaluation. Violations are in transcript order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TranscriptVerdict {
    pub violations: Vec<GuardrailViolation>,
    pub should_terminate: bool,
    /// Positions of entries that could not be read as a turn and were skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparseable_turns: Vec<usize>,
}

/// Candidate-facing outcome of a single-utterance check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RealtimeVerdict {
    pub terminate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub const INJECTION_TERMINATION_REASON: &str = "Prompt injection detected";
pub const TOXICITY_TERMINATION_REASON: &str = "Toxicity/harassment detected";

use std::sync::Arc;

use tracing::{debug, warn};

use super::rules;
use super::{
    GuardrailCheck, GuardrailViolation, INJECTION_TERMINATION_REASON, InjectionCheck, RealtimeVerdict, Role, Severity,
    TOXICITY_TERMINATION_REASON, ToxicityCheck, ToxicityLevel, TranscriptTurn, TranscriptVerdict, ViolationType,
};
use crate::metrics::GuardrailMetrics;

/// Detects attempts to override the interviewer's instructions.
pub trait InjectionDetector: Send + Sync {
    fn detect(&self, text: &str) -> InjectionCheck;
}

/// Grades harassing or unprofessional language.
pub trait ToxicityDetector: Send + Sync {
    fn classify(&self, text: &str) -> ToxicityCheck;
}

/// Signature-pattern injection detector backed by [`rules::detect_prompt_injection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternInjectionDetector;

impl InjectionDetector for PatternInjectionDetector {
    fn detect(&self, text: &str) -> InjectionCheck {
        rules::detect_prompt_injection(text)
    }
}

/// Word-list toxicity detector backed by [`rules::detect_toxicity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordToxicityDetector;

impl ToxicityDetector for KeywordToxicityDetector {
    fn classify(&self, text: &str) -> ToxicityCheck {
        rules::detect_toxicity(text)
    }
}

/// Per-turn result shared by the transcript and realtime paths.
struct TurnOutcome {
    injection: bool,
    terminating_toxicity: bool,
}

/// Applies the detectors to utterances and transcripts.
///
/// Does not persist anything; callers write the verdict back to their session.
#[derive(Clone)]
pub struct GuardrailEvaluator {
    injection: Arc<dyn InjectionDetector>,
    toxicity: Arc<dyn ToxicityDetector>,
    metrics: Option<GuardrailMetrics>,
}

impl Default for GuardrailEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(PatternInjectionDetector), Arc::new(KeywordToxicityDetector))
    }
}

impl GuardrailEvaluator {
    pub fn new(injection: Arc<dyn InjectionDetector>, toxicity: Arc<dyn ToxicityDetector>) -> Self {
        Self {
            injection,
            toxicity,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: GuardrailMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run both detectors on one text.
    pub fn check_text(&self, text: &str) -> GuardrailCheck {
        GuardrailCheck {
            prompt_injection: self.injection.detect(text),
            toxicity: self.toxicity.classify(text),
        }
    }

    fn evaluate_turn(
        &self,
        turn_index: usize,
        text: &str,
        toxicity_terminate_on_high: bool,
        violations: &mut Vec<GuardrailViolation>,
    ) -> TurnOutcome {
        let check = self.check_text(text);
        let injection = check.prompt_injection.detected;

        if injection {
            violations.push(GuardrailViolation {
                turn_index,
                role: Role::User,
                violation_type: ViolationType::PromptInjection,
                severity: Severity::High,
                reason: check
                    .prompt_injection
                    .reason
                    .unwrap_or_else(|| "Possible prompt injection".to_string()),
            });
        }

        let level = check.toxicity.level;
        if let Some(severity) = level.severity() {
            violations.push(GuardrailViolation {
                turn_index,
                role: Role::User,
                violation_type: ViolationType::Toxicity,
                severity,
                reason: check
                    .toxicity
                    .reason
                    .unwrap_or_else(|| format!("Toxicity level: {}", severity.as_str())),
            });
        }

        TurnOutcome {
            injection,
            terminating_toxicity: toxicity_terminate_on_high && level == ToxicityLevel::High,
        }
    }

    fn record(&self, violations: &[GuardrailViolation], terminate: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_violations(violations);
            if terminate {
                metrics.record_terminate_verdict();
            }
        }
    }

    /// Evaluate every candidate turn. Interviewer turns are trusted and skipped.
    pub fn check_transcript(&self, transcript: &[TranscriptTurn], toxicity_terminate_on_high: bool) -> TranscriptVerdict {
        let mut verdict = TranscriptVerdict::default();

        for (turn_index, turn) in transcript.iter().enumerate() {
            if turn.role != Role::User {
                continue;
            }
            let outcome = self.evaluate_turn(turn_index, &turn.text, toxicity_terminate_on_high, &mut verdict.violations);
            verdict.should_terminate |= outcome.injection || outcome.terminating_toxicity;
        }

        if !verdict.violations.is_empty() {
            warn!(
                violations = verdict.violations.len(),
                should_terminate = verdict.should_terminate,
                "Guardrail violations in transcript"
            );
        }
        self.record(&verdict.violations, verdict.should_terminate);
        verdict
    }

    /// Evaluate a transcript given as loosely-typed JSON. Entries that are not objects or lack a
    /// valid role are reported in `unparseable_turns` and skipped; the rest keep their positions.
    pub fn check_raw_transcript(&self, entries: &[serde_json::Value], toxicity_terminate_on_high: bool) -> TranscriptVerdict {
        let mut unparseable_turns = Vec::new();
        let mut turns = Vec::with_capacity(entries.len());
        let mut positions = Vec::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            match serde_json::from_value::<TranscriptTurn>(entry.clone()) {
                Ok(turn) => {
                    turns.push(turn);
                    positions.push(position);
                }
                Err(e) => {
                    debug!(position, error = %e, "Skipping unparseable transcript entry");
                    unparseable_turns.push(position);
                }
            }
        }

        let mut verdict = self.check_transcript(&turns, toxicity_terminate_on_high);
        for violation in &mut verdict.violations {
            violation.turn_index = positions[violation.turn_index];
        }
        verdict.unparseable_turns = unparseable_turns;
        verdict
    }

    /// Single-utterance check used mid-session. Same verdict as a one-turn transcript; the
    /// reason is deliberately non-specific.
    pub fn check_realtime(&self, text: &str, toxicity_terminate_on_high: bool) -> RealtimeVerdict {
        let mut violations = Vec::new();
        let outcome = self.evaluate_turn(0, text, toxicity_terminate_on_high, &mut violations);

        let reason = if outcome.injection {
            Some(INJECTION_TERMINATION_REASON)
        } else if outcome.terminating_toxicity {
            Some(TOXICITY_TERMINATION_REASON)
        } else {
            None
        };

        if let Some(reason) = reason {
            warn!(
                violations = ?violations.iter().map(|v| v.reason.as_str()).collect::<Vec<_>>(),
                "{reason}"
            );
        }
        self.record(&violations, reason.is_some());

        RealtimeVerdict {
            terminate: reason.is_some(),
            reason: reason.map(str::to_string),
        }
    }
}

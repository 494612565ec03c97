//! Guardrail metrics.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::guardrails::{GuardrailViolation, Severity};

/// Guardrail instruments
#[derive(Clone)]
pub struct GuardrailMetrics {
    /// Violations found, by type and severity
    violations: IntCounterVec,
    /// Evaluations that returned a terminate verdict. Stateless audits count too, so this is not
    /// a count of cancelled sessions.
    terminate_verdicts: IntCounter,
}

impl GuardrailMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let violations = IntCounterVec::new(
            Opts::new("hirectl_guardrail_violations_total", "Guardrail violations detected"),
            &["violation_type", "severity"],
        )?;
        registry.register(Box::new(violations.clone()))?;

        let terminate_verdicts = IntCounter::new(
            "hirectl_guardrail_terminate_verdicts_total",
            "Guardrail evaluations that returned a terminate verdict",
        )?;
        registry.register(Box::new(terminate_verdicts.clone()))?;

        Ok(Self {
            violations,
            terminate_verdicts,
        })
    }

    pub fn record_violation(&self, violation_type: &str, severity: Severity) {
        self.violations.with_label_values(&[violation_type, severity.as_str()]).inc();
    }

    pub fn record_violations(&self, violations: &[GuardrailViolation]) {
        for v in violations {
            self.record_violation(v.violation_type.as_str(), v.severity);
        }
    }

    pub fn record_terminate_verdict(&self) {
        self.terminate_verdicts.inc();
    }
}

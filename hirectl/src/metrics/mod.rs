//! Prometheus instruments for the credit ledger and the guardrail evaluator.
//!
//! Each struct registers its instruments on a shared [`prometheus::Registry`] at construction and
//! is cheap to clone. The registry is rendered at `/internal/metrics` when metrics are enabled.

mod credits;
mod guardrails;

pub use credits::LedgerMetrics;
pub use guardrails::GuardrailMetrics;

//! Credit ledger metrics.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::credits::packs::ResourceType;
use crate::credits::plans::PlanTier;

/// Ledger instruments
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Credits consumed, by resource type
    credits_deducted: IntCounterVec,
    /// Deductions refused because no live pack had a credit left, by resource type
    deductions_refused: IntCounterVec,
    /// Packs created by purchase or grant, by plan
    packs_created: IntCounterVec,
    /// Packs flagged EXHAUSTED after a deduction
    packs_exhausted: IntCounter,
}

impl LedgerMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let credits_deducted = IntCounterVec::new(
            Opts::new("hirectl_credits_deducted_total", "Credits consumed from packs"),
            &["resource_type"],
        )?;
        registry.register(Box::new(credits_deducted.clone()))?;

        let deductions_refused = IntCounterVec::new(
            Opts::new(
                "hirectl_credit_deductions_refused_total",
                "Deductions refused for insufficient credits",
            ),
            &["resource_type"],
        )?;
        registry.register(Box::new(deductions_refused.clone()))?;

        let packs_created = IntCounterVec::new(Opts::new("hirectl_credit_packs_created_total", "Credit packs created"), &["plan"])?;
        registry.register(Box::new(packs_created.clone()))?;

        let packs_exhausted = IntCounter::new("hirectl_credit_packs_exhausted_total", "Credit packs flagged as exhausted")?;
        registry.register(Box::new(packs_exhausted.clone()))?;

        Ok(Self {
            credits_deducted,
            deductions_refused,
            packs_created,
            packs_exhausted,
        })
    }

    pub fn record_deduction(&self, resource_type: ResourceType) {
        self.credits_deducted.with_label_values(&[resource_type.as_str()]).inc();
    }

    pub fn record_refusal(&self, resource_type: ResourceType) {
        self.deductions_refused.with_label_values(&[resource_type.as_str()]).inc();
    }

    pub fn record_pack_created(&self, plan: PlanTier) {
        self.packs_created.with_label_values(&[plan.as_str()]).inc();
    }

    pub fn record_pack_exhausted(&self) {
        self.packs_exhausted.inc();
    }
}

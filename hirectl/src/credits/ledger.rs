use bon::Builder;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::credits::packs::{Balance, CreditPack, Currency, NewCreditPack, PaymentReferences, ResourceType, UsageLog, UsageRecord};
use crate::credits::plans::PlanTier;
use crate::credits::store::DynPackStore;
use crate::credits::{LedgerError, Result};
use crate::metrics::LedgerMetrics;
use crate::types::{UserId, abbrev_uuid};

/// Credit validity applied to new packs unless configured otherwise
pub fn default_validity() -> Duration {
    Duration::days(365)
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Order in which live packs are drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOrder {
    /// Pack closest to expiry first, so credits are not lost to expiry
    #[default]
    SoonestExpiry,
    /// Pack closest to running out of the requested type first, ties broken by expiry
    FewestRemaining,
}

impl DrawOrder {
    fn sort(&self, packs: &mut [CreditPack], resource_type: ResourceType) {
        match self {
            DrawOrder::SoonestExpiry => packs.sort_by_key(|p| p.expires_at),
            DrawOrder::FewestRemaining => packs.sort_by_key(|p| (p.remaining(resource_type), p.expires_at)),
        }
    }
}

/// The only writer of credit packs.
///
/// Cheap to clone; every clone shares the same store.
#[derive(Clone, Builder)]
pub struct CreditLedger {
    store: DynPackStore,
    #[builder(default = default_validity())]
    validity: Duration,
    #[builder(default)]
    draw_order: DrawOrder,
    metrics: Option<LedgerMetrics>,
}

impl CreditLedger {
    pub fn store(&self) -> &DynPackStore {
        &self.store
    }

    /// Remaining credits per resource type across the user's live packs. Zeros for a user without
    /// packs.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_balance(&self, user_id: UserId) -> Result<Balance> {
        let now = Utc::now();
        let packs = self.store.live_packs(user_id, now).await?;
        Ok(Balance::from_packs(&packs, now))
    }

    /// The pack the next deduction of `resource_type` would draw from, if any.
    pub async fn find_drawable_pack(&self, user_id: UserId, resource_type: ResourceType) -> Result<Option<CreditPack>> {
        Ok(self.candidates(user_id, resource_type).await?.into_iter().next())
    }

    pub async fn has_credit(&self, user_id: UserId, resource_type: ResourceType) -> Result<bool> {
        Ok(self.find_drawable_pack(user_id, resource_type).await?.is_some())
    }

    /// Live packs holding at least one credit of `resource_type`, in draw order.
    async fn candidates(&self, user_id: UserId, resource_type: ResourceType) -> Result<Vec<CreditPack>> {
        let now = Utc::now();
        let mut packs: Vec<CreditPack> = self
            .store
            .live_packs(user_id, now)
            .await?
            .into_iter()
            .filter(|p| p.can_draw(resource_type, now))
            .collect();
        self.draw_order.sort(&mut packs, resource_type);
        Ok(packs)
    }

    /// Consume one credit of `resource_type` and record it against `reference_id`.
    ///
    /// Never retried here: a refused consume only means another request took that credit first,
    /// in which case the next candidate pack is tried. Fails with
    /// [`LedgerError::InsufficientCredits`] once no candidate is left.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn deduct(&self, user_id: UserId, resource_type: ResourceType, reference_id: Option<&str>) -> Result<UsageLog> {
        for pack in self.candidates(user_id, resource_type).await? {
            let consumed = self
                .store
                .try_consume(user_id, pack.id, resource_type, reference_id, Utc::now())
                .await?;

            let Some(log) = consumed else {
                debug!(pack_id = %abbrev_uuid(&pack.id), "Pack drained concurrently, trying next");
                continue;
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_deduction(resource_type);
            }
            self.flag_if_exhausted(user_id, &log).await;
            return Ok(log);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_refusal(resource_type);
        }
        Err(LedgerError::InsufficientCredits { resource_type })
    }

    /// Re-read the drawn pack and flag it EXHAUSTED if every family is used up. Failures are
    /// logged and swallowed; the counters alone keep an exhausted pack out of future draws.
    async fn flag_if_exhausted(&self, user_id: UserId, log: &UsageLog) {
        let pack = match self.store.get_pack(user_id, log.credit_pack_id).await {
            Ok(Some(pack)) => pack,
            Ok(None) => return,
            Err(e) => {
                warn!(pack_id = %abbrev_uuid(&log.credit_pack_id), error = %e, "Failed to re-read pack after deduction");
                return;
            }
        };

        if !pack.is_exhausted() {
            return;
        }

        match self.store.mark_exhausted(user_id, pack.id).await {
            Ok(true) => {
                info!(pack_id = %abbrev_uuid(&pack.id), plan = %pack.plan, "Credit pack exhausted");
                if let Some(metrics) = &self.metrics {
                    metrics.record_pack_exhausted();
                }
            }
            Ok(false) => {}
            Err(e) => warn!(pack_id = %abbrev_uuid(&pack.id), error = %e, "Failed to mark pack exhausted"),
        }
    }

    /// Create a paid pack for `plan`. Called once payment has been confirmed out of band.
    #[instrument(skip(self, payment), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_pack(
        &self,
        user_id: UserId,
        plan: PlanTier,
        amount_paid: i64,
        currency: Currency,
        quantity: Option<u32>,
        payment: PaymentReferences,
    ) -> Result<CreditPack> {
        let credits = plan.config().allocation(quantity)?;
        let purchased_at = Utc::now();

        let pack = self
            .store
            .insert_pack(NewCreditPack {
                user_id,
                plan,
                currency,
                credits,
                amount_paid,
                purchased_at,
                expires_at: purchased_at + self.validity,
                payment,
            })
            .await?;

        info!(pack_id = %abbrev_uuid(&pack.id), plan = %plan, amount_paid, "Created credit pack");
        if let Some(metrics) = &self.metrics {
            metrics.record_pack_created(plan);
        }
        Ok(pack)
    }

    /// Create a free pack, as granted by an administrator.
    pub async fn grant_pack(&self, user_id: UserId, plan: PlanTier, quantity: Option<u32>) -> Result<CreditPack> {
        self.create_pack(user_id, plan, 0, plan.config().currency, quantity, PaymentReferences::default())
            .await
    }

    /// Every pack of the user, including expired and exhausted ones, newest first.
    pub async fn list_packs(&self, user_id: UserId) -> Result<Vec<CreditPack>> {
        Ok(self.store.list_packs(user_id).await?)
    }

    /// Most recent deductions, newest first. The limit is clamped to `1..=100` and defaults to 50.
    pub async fn usage_history(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<UsageRecord>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.store.usage_history(user_id, i64::from(limit)).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credits::packs::{CreditCounts, PackStatus};
    use crate::credits::store::{InMemoryPackStore, PackStore};
    use prometheus::Registry;
    use uuid::Uuid;

    fn ledger_with(store: &InMemoryPackStore) -> CreditLedger {
        CreditLedger::builder().store(Arc::new(store.clone())).build()
    }

    async fn insert(store: &InMemoryPackStore, user_id: UserId, credits: CreditCounts, expires_in: Duration) -> CreditPack {
        let now = Utc::now();
        store
            .insert_pack(NewCreditPack {
                user_id,
                plan: PlanTier::Essential,
                currency: Currency::Usd,
                credits,
                amount_paid: 0,
                purchased_at: now,
                expires_at: now + expires_in,
                payment: PaymentReferences::default(),
            })
            .await
            .unwrap()
    }

    fn technical(n: i32) -> CreditCounts {
        CreditCounts {
            technical: n,
            ..Default::default()
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_two_technical_credits_then_refused() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        insert(&store, user, technical(2), Duration::days(365)).await;

        ledger.deduct(user, ResourceType::Technical, None).await.unwrap();
        ledger.deduct(user, ResourceType::Technical, Some("session-2")).await.unwrap();

        let err = ledger.deduct(user, ResourceType::Technical, None).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                resource_type: ResourceType::Technical
            }
        ));
        assert_eq!(ledger.get_balance(user).await.unwrap().get(ResourceType::Technical), 0);
    }

    #[tokio::test]
    async fn test_balance_for_unknown_user_is_zero() {
        let ledger = ledger_with(&InMemoryPackStore::new());
        let balance = ledger.get_balance(Uuid::new_v4()).await.unwrap();
        assert_eq!(balance, Balance::default());
    }

    #[tokio::test]
    async fn test_expired_pack_is_excluded() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        insert(&store, user, technical(5), -Duration::seconds(1)).await;

        assert_eq!(ledger.get_balance(user).await.unwrap().get(ResourceType::Technical), 0);
        assert!(!ledger.has_credit(user, ResourceType::Technical).await.unwrap());
        assert!(ledger.deduct(user, ResourceType::Technical, None).await.is_err());

        // Stored status is untouched; expiry alone excludes the pack
        let packs = ledger.list_packs(user).await.unwrap();
        assert_eq!(packs[0].status, PackStatus::Active);
        assert_eq!(packs[0].used.technical, 0);
    }

    #[tokio::test]
    async fn test_draws_soonest_expiry_first() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        let later = insert(&store, user, technical(3), Duration::days(300)).await;
        let sooner = insert(&store, user, technical(3), Duration::days(30)).await;

        let log = ledger.deduct(user, ResourceType::Technical, None).await.unwrap();
        assert_eq!(log.credit_pack_id, sooner.id);
        assert_ne!(log.credit_pack_id, later.id);
    }

    #[tokio::test]
    async fn test_fewest_remaining_draw_order() {
        let store = InMemoryPackStore::new();
        let ledger = CreditLedger::builder()
            .store(Arc::new(store.clone()))
            .draw_order(DrawOrder::FewestRemaining)
            .build();
        let user = Uuid::new_v4();
        insert(&store, user, technical(5), Duration::days(30)).await;
        let small = insert(&store, user, technical(1), Duration::days(300)).await;

        let log = ledger.deduct(user, ResourceType::Technical, None).await.unwrap();
        assert_eq!(log.credit_pack_id, small.id);
    }

    #[tokio::test]
    async fn test_falls_through_to_pack_with_matching_type() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        // Soonest pack holds no coding credits
        insert(&store, user, technical(1), Duration::days(1)).await;
        let coding = insert(
            &store,
            user,
            CreditCounts {
                coding: 2,
                ..Default::default()
            },
            Duration::days(200),
        )
        .await;

        let log = ledger.deduct(user, ResourceType::Coding, Some("test-42")).await.unwrap();
        assert_eq!(log.credit_pack_id, coding.id);
        assert_eq!(log.reference_id.as_deref(), Some("test-42"));
    }

    #[tokio::test]
    async fn test_interview_exhaustion_keeps_pack_active_while_aptitude_remains() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        let pack = insert(
            &store,
            user,
            CreditCounts {
                general: 1,
                aptitude: 1,
                ..Default::default()
            },
            Duration::days(365),
        )
        .await;

        ledger.deduct(user, ResourceType::General, None).await.unwrap();
        let after_interview = store.get_pack(user, pack.id).await.unwrap().unwrap();
        assert_eq!(after_interview.status, PackStatus::Active);

        ledger.deduct(user, ResourceType::Aptitude, None).await.unwrap();
        let after_aptitude = store.get_pack(user, pack.id).await.unwrap().unwrap();
        assert_eq!(after_aptitude.status, PackStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_balance_read_is_idempotent() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        ledger.grant_pack(user, PlanTier::Business, Some(25)).await.unwrap();

        let first = ledger.get_balance(user).await.unwrap();
        let second = ledger.get_balance(user).await.unwrap();
        assert_eq!(first, second);
        assert!(first.has_business_plan);
        assert_eq!(first.get(ResourceType::Technical), 15);
    }

    #[tokio::test]
    async fn test_create_pack_sets_validity_and_payment() {
        let store = InMemoryPackStore::new();
        let ledger = CreditLedger::builder()
            .store(Arc::new(store.clone()))
            .validity(Duration::days(30))
            .build();
        let user = Uuid::new_v4();

        let pack = ledger
            .create_pack(
                user,
                PlanTier::Pro,
                299000,
                Currency::Inr,
                None,
                PaymentReferences {
                    razorpay_order_id: Some("order_1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(pack.expires_at - pack.purchased_at, Duration::days(30));
        assert_eq!(pack.used, CreditCounts::default());
        assert_eq!(pack.credits.aptitude, 30);
        assert_eq!(pack.payment.razorpay_order_id.as_deref(), Some("order_1"));
    }

    #[tokio::test]
    async fn test_create_pack_rejects_unsold_quantity() {
        let ledger = ledger_with(&InMemoryPackStore::new());
        let err = ledger.grant_pack(Uuid::new_v4(), PlanTier::Business, Some(7)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity { quantity: 7, .. }));
    }

    #[tokio::test]
    async fn test_usage_history_is_newest_first_and_clamped() {
        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        insert(&store, user, technical(3), Duration::days(365)).await;

        for reference in ["a", "b", "c"] {
            ledger.deduct(user, ResourceType::Technical, Some(reference)).await.unwrap();
        }

        let history = ledger.usage_history(user, None).await.unwrap();
        let refs: Vec<_> = history.iter().map(|r| r.log.reference_id.clone().unwrap()).collect();
        assert_eq!(refs, ["c", "b", "a"]);
        assert_eq!(history[0].plan, PlanTier::Essential);

        // Zero is clamped up to one entry
        assert_eq!(ledger.usage_history(user, Some(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_track_deductions_and_refusals() {
        let registry = Registry::new();
        let store = InMemoryPackStore::new();
        let ledger = CreditLedger::builder()
            .store(Arc::new(store.clone()))
            .metrics(LedgerMetrics::new(&registry).unwrap())
            .build();
        let user = Uuid::new_v4();
        insert(&store, user, technical(1), Duration::days(1)).await;

        ledger.deduct(user, ResourceType::Technical, None).await.unwrap();
        ledger.deduct(user, ResourceType::Technical, None).await.unwrap_err();

        let families = registry.gather();
        let value = |name: &str| {
            families
                .iter()
                .find(|f| f.name() == name)
                .map(|f| f.get_metric()[0].get_counter().value())
                .unwrap()
        };
        assert_eq!(value("hirectl_credits_deducted_total"), 1.0);
        assert_eq!(value("hirectl_credit_deductions_refused_total"), 1.0);
        assert_eq!(value("hirectl_credit_packs_exhausted_total"), 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_deductions_never_overspend() {
        const REQUESTS: i32 = 20;

        let store = InMemoryPackStore::new();
        let ledger = ledger_with(&store);
        let user = Uuid::new_v4();
        // Spread the N-1 credits over two packs so racing requests also fall through between them
        insert(&store, user, technical(REQUESTS / 2), Duration::days(10)).await;
        insert(&store, user, technical(REQUESTS / 2 - 1), Duration::days(20)).await;

        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.deduct(user, ResourceType::Technical, None).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientCredits { .. }) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, REQUESTS - 1);
        assert_eq!(refused, 1);
        for pack in ledger.list_packs(user).await.unwrap() {
            assert_eq!(pack.used.technical, pack.credits.technical);
        }
        assert_eq!(ledger.usage_history(user, Some(100)).await.unwrap().len(), (REQUESTS - 1) as usize);
    }
}

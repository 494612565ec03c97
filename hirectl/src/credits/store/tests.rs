use chrono::{Duration, Utc};
use rstest::{fixture, rstest};
use uuid::Uuid;

use crate::credits::packs::{CreditCounts, Currency, NewCreditPack, PackStatus, PaymentReferences, ResourceType};
use crate::credits::plans::PlanTier;
use crate::credits::store::{InMemoryPackStore, PackStore};
use crate::types::UserId;

#[cfg(feature = "postgres-tests")]
use crate::credits::store::PostgresPackStore;

fn new_pack(user_id: UserId, credits: CreditCounts, expires_in: Duration) -> NewCreditPack {
    let now = Utc::now();
    NewCreditPack {
        user_id,
        plan: PlanTier::Business,
        currency: Currency::Usd,
        credits,
        amount_paid: 17990,
        purchased_at: now,
        expires_at: now + expires_in,
        payment: PaymentReferences {
            stripe_payment_id: Some("pi_test".to_string()),
            ..Default::default()
        },
    }
}

fn hr(n: i32) -> CreditCounts {
    CreditCounts {
        hr: n,
        ..Default::default()
    }
}

#[fixture]
fn in_memory_store() -> InMemoryPackStore {
    InMemoryPackStore::new()
}

async fn run_test_insert_and_get<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let created = store.insert_pack(new_pack(user, hr(2), Duration::days(10))).await.unwrap();

    assert_eq!(created.status, PackStatus::Active);
    assert_eq!(created.used, CreditCounts::default());
    assert_eq!(created.payment.stripe_payment_id.as_deref(), Some("pi_test"));

    let fetched = store.get_pack(user, created.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.credits.hr, 2);

    // Packs are only visible to their owner
    assert!(store.get_pack(Uuid::new_v4(), created.id).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_insert_and_get(in_memory_store: InMemoryPackStore) {
    run_test_insert_and_get(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_insert_and_get_postgres(pool: sqlx::PgPool) {
    run_test_insert_and_get(&PostgresPackStore::new(pool)).await;
}

async fn run_test_live_packs_excludes_expired_and_orders_by_expiry<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let late = store.insert_pack(new_pack(user, hr(1), Duration::days(90))).await.unwrap();
    let early = store.insert_pack(new_pack(user, hr(1), Duration::days(5))).await.unwrap();
    store.insert_pack(new_pack(user, hr(1), -Duration::days(1))).await.unwrap();

    let live = store.live_packs(user, Utc::now()).await.unwrap();
    let ids: Vec<_> = live.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    // Expired packs still show up in the full listing
    assert_eq!(store.list_packs(user).await.unwrap().len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_live_packs_excludes_expired_and_orders_by_expiry(in_memory_store: InMemoryPackStore) {
    run_test_live_packs_excludes_expired_and_orders_by_expiry(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_live_packs_excludes_expired_and_orders_by_expiry_postgres(pool: sqlx::PgPool) {
    run_test_live_packs_excludes_expired_and_orders_by_expiry(&PostgresPackStore::new(pool)).await;
}

async fn run_test_try_consume_stops_at_allotment<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let pack = store.insert_pack(new_pack(user, hr(1), Duration::days(10))).await.unwrap();
    let now = Utc::now();

    let log = store
        .try_consume(user, pack.id, ResourceType::Hr, Some("session-1"), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.credit_pack_id, pack.id);
    assert_eq!(log.resource_type, ResourceType::Hr);
    assert_eq!(log.reference_id.as_deref(), Some("session-1"));

    // Counter is at its allotment: nothing changes
    let refused = store.try_consume(user, pack.id, ResourceType::Hr, None, now).await.unwrap();
    assert!(refused.is_none());

    // A type the pack never held is refused too
    let other = store.try_consume(user, pack.id, ResourceType::Coding, None, now).await.unwrap();
    assert!(other.is_none());

    let after = store.get_pack(user, pack.id).await.unwrap().unwrap();
    assert_eq!(after.used.hr, 1);
    assert_eq!(after.used.coding, 0);
    assert_eq!(store.usage_history(user, 10).await.unwrap().len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_try_consume_stops_at_allotment(in_memory_store: InMemoryPackStore) {
    run_test_try_consume_stops_at_allotment(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_try_consume_stops_at_allotment_postgres(pool: sqlx::PgPool) {
    run_test_try_consume_stops_at_allotment(&PostgresPackStore::new(pool)).await;
}

async fn run_test_try_consume_refuses_expired_or_foreign_pack<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let expired = store.insert_pack(new_pack(user, hr(3), -Duration::hours(1))).await.unwrap();
    let live = store.insert_pack(new_pack(user, hr(3), Duration::days(1))).await.unwrap();
    let now = Utc::now();

    assert!(store.try_consume(user, expired.id, ResourceType::Hr, None, now).await.unwrap().is_none());
    assert!(
        store
            .try_consume(Uuid::new_v4(), live.id, ResourceType::Hr, None, now)
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.usage_history(user, 10).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_try_consume_refuses_expired_or_foreign_pack(in_memory_store: InMemoryPackStore) {
    run_test_try_consume_refuses_expired_or_foreign_pack(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_try_consume_refuses_expired_or_foreign_pack_postgres(pool: sqlx::PgPool) {
    run_test_try_consume_refuses_expired_or_foreign_pack(&PostgresPackStore::new(pool)).await;
}

async fn run_test_mark_exhausted_is_one_shot<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let pack = store.insert_pack(new_pack(user, hr(1), Duration::days(1))).await.unwrap();

    assert!(store.mark_exhausted(user, pack.id).await.unwrap());
    assert!(!store.mark_exhausted(user, pack.id).await.unwrap());

    let after = store.get_pack(user, pack.id).await.unwrap().unwrap();
    assert_eq!(after.status, PackStatus::Exhausted);
    assert!(store.live_packs(user, Utc::now()).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_mark_exhausted_is_one_shot(in_memory_store: InMemoryPackStore) {
    run_test_mark_exhausted_is_one_shot(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_mark_exhausted_is_one_shot_postgres(pool: sqlx::PgPool) {
    run_test_mark_exhausted_is_one_shot(&PostgresPackStore::new(pool)).await;
}

async fn run_test_usage_history_newest_first_with_limit<S: PackStore>(store: &S) {
    let user = Uuid::new_v4();
    let pack = store.insert_pack(new_pack(user, hr(5), Duration::days(1))).await.unwrap();
    let start = Utc::now();

    for (i, reference) in ["first", "second", "third"].iter().enumerate() {
        store
            .try_consume(user, pack.id, ResourceType::Hr, Some(*reference), start + Duration::seconds(i as i64))
            .await
            .unwrap()
            .unwrap();
    }

    let history = store.usage_history(user, 2).await.unwrap();
    let refs: Vec<_> = history.iter().map(|r| r.log.reference_id.as_deref().unwrap()).collect();
    assert_eq!(refs, ["third", "second"]);
    assert_eq!(history[0].plan, PlanTier::Business);
    assert_eq!(history[0].log.credit_pack_id, pack.id);
}

#[rstest]
#[tokio::test]
async fn test_usage_history_newest_first_with_limit(in_memory_store: InMemoryPackStore) {
    run_test_usage_history_newest_first_with_limit(&in_memory_store).await;
}

#[cfg(feature = "postgres-tests")]
#[sqlx::test]
async fn test_usage_history_newest_first_with_limit_postgres(pool: sqlx::PgPool) {
    run_test_usage_history_newest_first_with_limit(&PostgresPackStore::new(pool)).await;
}

//! PostgreSQL pack store.
//!
//! Consumption is one conditional `UPDATE ... WHERE used < allotted` followed by the usage log
//! insert, both inside one transaction. The affected-row count decides whether the draw happened,
//! so no read-then-write race exists between concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::credits::packs::{CreditPack, NewCreditPack, ResourceType, UsageLog, UsageRecord};
use crate::credits::store::PackStore;
use crate::db::errors::Result;
use crate::db::handlers::CreditPacks;
use crate::types::{PackId, UserId, abbrev_uuid};

/// PostgreSQL implementation of the [`PackStore`] trait.
#[derive(Debug, Clone)]
pub struct PostgresPackStore {
    pool: PgPool,
}

impl PostgresPackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PackStore for PostgresPackStore {
    async fn insert_pack(&self, pack: NewCreditPack) -> Result<CreditPack> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).create(&pack).await
    }

    async fn live_packs(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<CreditPack>> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).list_live(user_id, now).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), pack_id = %abbrev_uuid(&pack_id)), err)]
    async fn try_consume(
        &self,
        user_id: UserId,
        pack_id: PackId,
        resource_type: ResourceType,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageLog>> {
        let mut tx = self.pool.begin().await?;
        let mut repo = CreditPacks::new(&mut tx);

        if !repo.increment_used(user_id, pack_id, resource_type, now).await? {
            debug!("Conditional update matched no row, pack has nothing left to draw");
            // Dropping the transaction rolls it back
            return Ok(None);
        }

        let log = repo.insert_usage(user_id, pack_id, resource_type, reference_id, now).await?;
        tx.commit().await?;
        Ok(Some(log))
    }

    async fn get_pack(&self, user_id: UserId, pack_id: PackId) -> Result<Option<CreditPack>> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).get(user_id, pack_id).await
    }

    async fn mark_exhausted(&self, user_id: UserId, pack_id: PackId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).mark_exhausted(user_id, pack_id).await
    }

    async fn list_packs(&self, user_id: UserId) -> Result<Vec<CreditPack>> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).list_for_user(user_id).await
    }

    async fn usage_history(&self, user_id: UserId, limit: i64) -> Result<Vec<UsageRecord>> {
        let mut conn = self.pool.acquire().await?;
        CreditPacks::new(&mut conn).usage_history(user_id, limit).await
    }
}

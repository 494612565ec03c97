//! Pack Store: persistence for credit packs and usage logs.
//!
//! The store is the only mutable shared resource in the credit system. Implementations must make
//! [`PackStore::try_consume`] a single atomic conditional update: the `used` counter is only
//! incremented while it is below the allotment, and the usage log is written in the same unit of
//! work. Two concurrent consumers of the last remaining credit can therefore never both succeed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credits::packs::{CreditPack, NewCreditPack, ResourceType, UsageLog, UsageRecord};
use crate::db::errors::Result;
use crate::types::{PackId, UserId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPackStore;
pub use postgres::PostgresPackStore;

#[async_trait]
pub trait PackStore: Send + Sync {
    /// Insert a new ACTIVE pack with zero `used` counters.
    async fn insert_pack(&self, pack: NewCreditPack) -> Result<CreditPack>;

    /// ACTIVE packs of `user_id` whose expiry is after `now`, soonest-to-expire first.
    async fn live_packs(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<CreditPack>>;

    /// Atomically consume one credit of `resource_type` from the given pack and record it.
    ///
    /// Returns `None` without changing anything if the pack is not owned by `user_id`, is no
    /// longer live at `now`, or has no remaining credit of that type.
    async fn try_consume(
        &self,
        user_id: UserId,
        pack_id: PackId,
        resource_type: ResourceType,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageLog>>;

    /// Fetch a single pack owned by `user_id`.
    async fn get_pack(&self, user_id: UserId, pack_id: PackId) -> Result<Option<CreditPack>>;

    /// Flag a pack as EXHAUSTED. Advisory only; returns whether the status changed.
    async fn mark_exhausted(&self, user_id: UserId, pack_id: PackId) -> Result<bool>;

    /// All packs of a user regardless of status or expiry, newest purchase first.
    async fn list_packs(&self, user_id: UserId) -> Result<Vec<CreditPack>>;

    /// Most recent usage of a user, newest first.
    async fn usage_history(&self, user_id: UserId, limit: i64) -> Result<Vec<UsageRecord>>;
}

pub type DynPackStore = Arc<dyn PackStore>;

#[cfg(test)]
mod tests;

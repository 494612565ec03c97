//! In-memory pack store.
//!
//! Packs and usage logs are kept per user in a concurrent map. A user's packs and logs live in the
//! same entry, so a consume holds that entry's lock while it checks the counter, bumps it and
//! appends the log. Suitable for tests and single-process development; data is lost on restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::credits::packs::{CreditCounts, CreditPack, NewCreditPack, PackStatus, ResourceType, UsageLog, UsageRecord};
use crate::credits::store::PackStore;
use crate::db::errors::Result;
use crate::types::{PackId, UserId};

#[derive(Debug, Default)]
struct UserLedger {
    packs: Vec<CreditPack>,
    usage: Vec<UsageLog>,
}

/// In-memory implementation of the [`PackStore`] trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPackStore {
    users: Arc<DashMap<UserId, UserLedger>>,
}

impl InMemoryPackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackStore for InMemoryPackStore {
    async fn insert_pack(&self, pack: NewCreditPack) -> Result<CreditPack> {
        let created = CreditPack {
            id: Uuid::new_v4(),
            user_id: pack.user_id,
            plan: pack.plan,
            currency: pack.currency,
            credits: pack.credits,
            used: CreditCounts::default(),
            amount_paid: pack.amount_paid,
            purchased_at: pack.purchased_at,
            expires_at: pack.expires_at,
            status: PackStatus::Active,
            payment: pack.payment,
        };

        self.users.entry(pack.user_id).or_default().packs.push(created.clone());
        Ok(created)
    }

    async fn live_packs(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<CreditPack>> {
        let mut packs: Vec<CreditPack> = match self.users.get(&user_id) {
            Some(ledger) => ledger.packs.iter().filter(|p| p.is_live(now)).cloned().collect(),
            None => Vec::new(),
        };
        packs.sort_by_key(|p| p.expires_at);
        Ok(packs)
    }

    async fn try_consume(
        &self,
        user_id: UserId,
        pack_id: PackId,
        resource_type: ResourceType,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageLog>> {
        let Some(mut ledger) = self.users.get_mut(&user_id) else {
            return Ok(None);
        };

        let Some(pack) = ledger.packs.iter_mut().find(|p| p.id == pack_id) else {
            return Ok(None);
        };
        if !pack.can_draw(resource_type, now) {
            return Ok(None);
        }
        pack.used.add(resource_type, 1);

        let log = UsageLog {
            id: Uuid::new_v4(),
            user_id,
            credit_pack_id: pack_id,
            resource_type,
            reference_id: reference_id.map(str::to_string),
            created_at: now,
        };
        ledger.usage.push(log.clone());
        Ok(Some(log))
    }

    async fn get_pack(&self, user_id: UserId, pack_id: PackId) -> Result<Option<CreditPack>> {
        Ok(self
            .users
            .get(&user_id)
            .and_then(|ledger| ledger.packs.iter().find(|p| p.id == pack_id).cloned()))
    }

    async fn mark_exhausted(&self, user_id: UserId, pack_id: PackId) -> Result<bool> {
        let Some(mut ledger) = self.users.get_mut(&user_id) else {
            return Ok(false);
        };
        match ledger.packs.iter_mut().find(|p| p.id == pack_id) {
            Some(pack) if pack.status == PackStatus::Active => {
                pack.status = PackStatus::Exhausted;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_packs(&self, user_id: UserId) -> Result<Vec<CreditPack>> {
        let mut packs = match self.users.get(&user_id) {
            Some(ledger) => ledger.packs.clone(),
            None => Vec::new(),
        };
        packs.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(packs)
    }

    async fn usage_history(&self, user_id: UserId, limit: i64) -> Result<Vec<UsageRecord>> {
        let Some(ledger) = self.users.get(&user_id) else {
            return Ok(Vec::new());
        };

        // Logs are appended in time order, so newest-first is the reversed vector
        let records = ledger
            .usage
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .filter_map(|log| {
                ledger.packs.iter().find(|p| p.id == log.credit_pack_id).map(|pack| UsageRecord {
                    log: log.clone(),
                    plan: pack.plan,
                    pack_purchased_at: pack.purchased_at,
                })
            })
            .collect();
        Ok(records)
    }
}

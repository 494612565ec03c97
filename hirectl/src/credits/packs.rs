//! Credit pack domain model.
//!
//! A [`CreditPack`] is one purchase or grant: six allotment counters, six mirrored `used`
//! counters, an expiry and an advisory status. Packs are append-only financial records; the only
//! mutation is a single `used` increment performed by the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::credits::plans::PlanTier;
use crate::types::{PackId, UsageLogId, UserId};

/// One of the six countable usage rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Technical,
    Hr,
    Behavioral,
    General,
    Aptitude,
    Coding,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Technical,
        ResourceType::Hr,
        ResourceType::Behavioral,
        ResourceType::General,
        ResourceType::Aptitude,
        ResourceType::Coding,
    ];

    /// The four interview types, which share one exhaustion family.
    pub const INTERVIEW: [ResourceType; 4] = [
        ResourceType::Technical,
        ResourceType::Hr,
        ResourceType::Behavioral,
        ResourceType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Technical => "technical",
            ResourceType::Hr => "hr",
            ResourceType::Behavioral => "behavioral",
            ResourceType::General => "general",
            ResourceType::Aptitude => "aptitude",
            ResourceType::Coding => "coding",
        }
    }

    pub fn is_interview(&self) -> bool {
        Self::INTERVIEW.contains(self)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ResourceType::ALL
            .into_iter()
            .find(|rt| rt.as_str() == lower)
            .ok_or_else(|| format!("unknown resource type: {s}"))
    }
}

/// Currency a pack was paid in. Amounts are always stored in the smallest unit (cents, paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Inr,
}

/// Advisory pack status. Balance and deduction never depend on it; they use the counters and
/// the expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PackStatus {
    Active,
    Exhausted,
}

/// One counter per resource type. Used both for allotments and for `used` counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreditCounts {
    pub technical: i32,
    pub hr: i32,
    pub behavioral: i32,
    pub general: i32,
    pub aptitude: i32,
    pub coding: i32,
}

impl CreditCounts {
    pub fn get(&self, resource_type: ResourceType) -> i32 {
        match resource_type {
            ResourceType::Technical => self.technical,
            ResourceType::Hr => self.hr,
            ResourceType::Behavioral => self.behavioral,
            ResourceType::General => self.general,
            ResourceType::Aptitude => self.aptitude,
            ResourceType::Coding => self.coding,
        }
    }

    fn get_mut(&mut self, resource_type: ResourceType) -> &mut i32 {
        match resource_type {
            ResourceType::Technical => &mut self.technical,
            ResourceType::Hr => &mut self.hr,
            ResourceType::Behavioral => &mut self.behavioral,
            ResourceType::General => &mut self.general,
            ResourceType::Aptitude => &mut self.aptitude,
            ResourceType::Coding => &mut self.coding,
        }
    }

    pub fn add(&mut self, resource_type: ResourceType, amount: i32) {
        *self.get_mut(resource_type) += amount;
    }

    /// Sum of the four interview counters.
    pub fn interview_total(&self) -> i64 {
        ResourceType::INTERVIEW.iter().map(|rt| i64::from(self.get(*rt))).sum()
    }
}

/// External payment references recorded on purchased packs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentReferences {
    pub stripe_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
}

/// A purchased or granted credit pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreditPack {
    #[schema(value_type = String, format = "uuid")]
    pub id: PackId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub plan: PlanTier,
    pub currency: Currency,
    pub credits: CreditCounts,
    pub used: CreditCounts,
    /// Amount paid in the smallest currency unit (0 for admin grants)
    pub amount_paid: i64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PackStatus,
    pub payment: PaymentReferences,
}

impl CreditPack {
    pub fn remaining(&self, resource_type: ResourceType) -> i32 {
        self.credits.get(resource_type) - self.used.get(resource_type)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Counted in balances: ACTIVE and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == PackStatus::Active && !self.is_expired(now)
    }

    /// Whether one credit of `resource_type` may be drawn from this pack right now.
    pub fn can_draw(&self, resource_type: ResourceType, now: DateTime<Utc>) -> bool {
        self.is_live(now) && self.remaining(resource_type) > 0
    }

    /// A pack is exhausted once every family it holds is fully used: the four interview types
    /// summed together, and aptitude and coding each on their own.
    pub fn is_exhausted(&self) -> bool {
        let interviews_done = self.used.interview_total() >= self.credits.interview_total();
        let aptitude_done = self.used.aptitude >= self.credits.aptitude;
        let coding_done = self.used.coding >= self.credits.coding;
        interviews_done && aptitude_done && coding_done
    }
}

/// Everything needed to insert a new pack. `used` counters always start at zero.
#[derive(Debug, Clone)]
pub struct NewCreditPack {
    pub user_id: UserId,
    pub plan: PlanTier,
    pub currency: Currency,
    pub credits: CreditCounts,
    pub amount_paid: i64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payment: PaymentReferences,
}

/// Append-only record of one successful deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageLog {
    #[schema(value_type = String, format = "uuid")]
    pub id: UsageLogId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub credit_pack_id: PackId,
    pub resource_type: ResourceType,
    /// Session or other entity that consumed the credit
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A usage log joined with the plan and purchase time of the pack it drew from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageRecord {
    #[serde(flatten)]
    pub log: UsageLog,
    pub plan: PlanTier,
    pub pack_purchased_at: DateTime<Utc>,
}

/// Derived per-user balance. Never stored; recomputed from live packs on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Balance {
    #[serde(flatten)]
    pub remaining: CreditCounts,
    /// True if any live pack belongs to the business tier
    pub has_business_plan: bool,
}

impl Balance {
    /// Aggregate the remaining credits of the given packs, ignoring any that are not live.
    pub fn from_packs<'a>(packs: impl IntoIterator<Item = &'a CreditPack>, now: DateTime<Utc>) -> Self {
        let mut balance = Balance::default();
        for pack in packs.into_iter().filter(|p| p.is_live(now)) {
            for rt in ResourceType::ALL {
                balance.remaining.add(rt, pack.remaining(rt));
            }
            if pack.plan == PlanTier::BUSINESS_TIER {
                balance.has_business_plan = true;
            }
        }
        balance
    }

    pub fn get(&self, resource_type: ResourceType) -> i32 {
        self.remaining.get(resource_type)
    }
}

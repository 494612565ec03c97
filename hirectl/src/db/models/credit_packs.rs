//! Database models for credit packs and usage logs.

use crate::credits::packs::{CreditCounts, CreditPack, Currency, PackStatus, PaymentReferences, ResourceType, UsageLog, UsageRecord};
use crate::credits::plans::PlanTier;
use crate::types::{PackId, UsageLogId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Column list shared by every query that returns a full pack row
pub(crate) const CREDIT_PACK_COLUMNS: &str = r#"
    id, user_id, plan, currency,
    technical_credits, hr_credits, behavioral_credits, general_credits, aptitude_credits, coding_credits,
    used_technical, used_hr, used_behavioral, used_general, used_aptitude, used_coding,
    amount_paid, purchased_at, expires_at, status,
    stripe_payment_id, razorpay_order_id, razorpay_payment_id
"#;

/// Database entity model for a credit pack
#[derive(Debug, Clone, FromRow)]
pub struct CreditPackRow {
    pub id: PackId,
    pub user_id: UserId,
    pub plan: PlanTier,
    pub currency: Currency,
    pub technical_credits: i32,
    pub hr_credits: i32,
    pub behavioral_credits: i32,
    pub general_credits: i32,
    pub aptitude_credits: i32,
    pub coding_credits: i32,
    pub used_technical: i32,
    pub used_hr: i32,
    pub used_behavioral: i32,
    pub used_general: i32,
    pub used_aptitude: i32,
    pub used_coding: i32,
    pub amount_paid: i64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PackStatus,
    pub stripe_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
}

impl From<CreditPackRow> for CreditPack {
    fn from(row: CreditPackRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            plan: row.plan,
            currency: row.currency,
            credits: CreditCounts {
                technical: row.technical_credits,
                hr: row.hr_credits,
                behavioral: row.behavioral_credits,
                general: row.general_credits,
                aptitude: row.aptitude_credits,
                coding: row.coding_credits,
            },
            used: CreditCounts {
                technical: row.used_technical,
                hr: row.used_hr,
                behavioral: row.used_behavioral,
                general: row.used_general,
                aptitude: row.used_aptitude,
                coding: row.used_coding,
            },
            amount_paid: row.amount_paid,
            purchased_at: row.purchased_at,
            expires_at: row.expires_at,
            status: row.status,
            payment: PaymentReferences {
                stripe_payment_id: row.stripe_payment_id,
                razorpay_order_id: row.razorpay_order_id,
                razorpay_payment_id: row.razorpay_payment_id,
            },
        }
    }
}

/// Database entity model for a usage log
#[derive(Debug, Clone, FromRow)]
pub struct UsageLogRow {
    pub id: UsageLogId,
    pub user_id: UserId,
    pub credit_pack_id: PackId,
    pub resource_type: ResourceType,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UsageLogRow> for UsageLog {
    fn from(row: UsageLogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            credit_pack_id: row.credit_pack_id,
            resource_type: row.resource_type,
            reference_id: row.reference_id,
            created_at: row.created_at,
        }
    }
}

/// Usage log joined with its pack's plan and purchase time
#[derive(Debug, Clone, FromRow)]
pub struct UsageRecordRow {
    #[sqlx(flatten)]
    pub log: UsageLogRow,
    pub plan: PlanTier,
    pub pack_purchased_at: DateTime<Utc>,
}

impl From<UsageRecordRow> for UsageRecord {
    fn from(row: UsageRecordRow) -> Self {
        Self {
            log: row.log.into(),
            plan: row.plan,
            pack_purchased_at: row.pack_purchased_at,
        }
    }
}

/// Column pair (allotment, used) backing a resource type
pub(crate) fn counter_columns(resource_type: ResourceType) -> (&'static str, &'static str) {
    match resource_type {
        ResourceType::Technical => ("technical_credits", "used_technical"),
        ResourceType::Hr => ("hr_credits", "used_hr"),
        ResourceType::Behavioral => ("behavioral_credits", "used_behavioral"),
        ResourceType::General => ("general_credits", "used_general"),
        ResourceType::Aptitude => ("aptitude_credits", "used_aptitude"),
        ResourceType::Coding => ("coding_credits", "used_coding"),
    }
}

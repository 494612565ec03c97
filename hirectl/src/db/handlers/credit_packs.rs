use crate::credits::packs::{CreditPack, NewCreditPack, ResourceType, UsageLog, UsageRecord};
use crate::db::{
    errors::Result,
    models::credit_packs::{CREDIT_PACK_COLUMNS, CreditPackRow, UsageLogRow, UsageRecordRow, counter_columns},
};
use crate::types::{PackId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Repository for the `credit_packs` and `usage_logs` tables.
///
/// Statements run on whatever connection it wraps; callers that need the counter increment and
/// usage log to land together must hand it a transaction.
pub struct CreditPacks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CreditPacks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, pack), fields(user_id = %pack.user_id, plan = %pack.plan), err)]
    pub async fn create(&mut self, pack: &NewCreditPack) -> Result<CreditPack> {
        let query = format!(
            r#"
            INSERT INTO credit_packs (
                id, user_id, plan, currency,
                technical_credits, hr_credits, behavioral_credits, general_credits, aptitude_credits, coding_credits,
                amount_paid, purchased_at, expires_at, status,
                stripe_payment_id, razorpay_order_id, razorpay_payment_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'active', $14, $15, $16)
            RETURNING {CREDIT_PACK_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CreditPackRow>(&query)
            .bind(Uuid::new_v4())
            .bind(pack.user_id)
            .bind(pack.plan)
            .bind(pack.currency)
            .bind(pack.credits.technical)
            .bind(pack.credits.hr)
            .bind(pack.credits.behavioral)
            .bind(pack.credits.general)
            .bind(pack.credits.aptitude)
            .bind(pack.credits.coding)
            .bind(pack.amount_paid)
            .bind(pack.purchased_at)
            .bind(pack.expires_at)
            .bind(pack.payment.stripe_payment_id.as_deref())
            .bind(pack.payment.razorpay_order_id.as_deref())
            .bind(pack.payment.razorpay_payment_id.as_deref())
            .fetch_one(&mut *self.db)
            .await?;

        Ok(row.into())
    }

    /// ACTIVE, unexpired packs for a user, soonest expiry first
    pub async fn list_live(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<Vec<CreditPack>> {
        let query = format!(
            r#"
            SELECT {CREDIT_PACK_COLUMNS}
            FROM credit_packs
            WHERE user_id = $1 AND status = 'active' AND expires_at > $2
            ORDER BY expires_at ASC, purchased_at ASC
            "#
        );

        let rows = sqlx::query_as::<_, CreditPackRow>(&query)
            .bind(user_id)
            .bind(now)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(CreditPack::from).collect())
    }

    /// Increment one `used` counter only while it is below its allotment and the pack is live.
    /// Returns whether a row was updated.
    pub async fn increment_used(
        &mut self,
        user_id: UserId,
        pack_id: PackId,
        resource_type: ResourceType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let (allotted, used) = counter_columns(resource_type);
        let query = format!(
            r#"
            UPDATE credit_packs
            SET {used} = {used} + 1
            WHERE id = $1 AND user_id = $2 AND status = 'active' AND expires_at > $3 AND {used} < {allotted}
            "#
        );

        let result = sqlx::query(&query)
            .bind(pack_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_usage(
        &mut self,
        user_id: UserId,
        pack_id: PackId,
        resource_type: ResourceType,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UsageLog> {
        let row = sqlx::query_as::<_, UsageLogRow>(
            r#"
            INSERT INTO usage_logs (id, user_id, credit_pack_id, resource_type, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, credit_pack_id, resource_type, reference_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(pack_id)
        .bind(resource_type)
        .bind(reference_id)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    pub async fn get(&mut self, user_id: UserId, pack_id: PackId) -> Result<Option<CreditPack>> {
        let query = format!(
            r#"
            SELECT {CREDIT_PACK_COLUMNS}
            FROM credit_packs
            WHERE id = $1 AND user_id = $2
            "#
        );

        let row = sqlx::query_as::<_, CreditPackRow>(&query)
            .bind(pack_id)
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(CreditPack::from))
    }

    pub async fn mark_exhausted(&mut self, user_id: UserId, pack_id: PackId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE credit_packs
            SET status = 'exhausted'
            WHERE id = $1 AND user_id = $2 AND status = 'active'
            "#,
        )
        .bind(pack_id)
        .bind(user_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Every pack of a user, newest purchase first
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<CreditPack>> {
        let query = format!(
            r#"
            SELECT {CREDIT_PACK_COLUMNS}
            FROM credit_packs
            WHERE user_id = $1
            ORDER BY purchased_at DESC, id DESC
            "#
        );

        let rows = sqlx::query_as::<_, CreditPackRow>(&query)
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(CreditPack::from).collect())
    }

    pub async fn usage_history(&mut self, user_id: UserId, limit: i64) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRecordRow>(
            r#"
            SELECT u.id, u.user_id, u.credit_pack_id, u.resource_type, u.reference_id, u.created_at,
                   p.plan, p.purchased_at AS pack_purchased_at
            FROM usage_logs u
            JOIN credit_packs p ON p.id = u.credit_pack_id
            WHERE u.user_id = $1
            ORDER BY u.created_at DESC, u.id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(UsageRecord::from).collect())
    }
}

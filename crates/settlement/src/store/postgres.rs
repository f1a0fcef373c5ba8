use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::{Json, Uuid};
use sqlx::{PgPool, Row};

use aula_common::get_current_timestamp;

use crate::campaign::Campaign;
use crate::coupon::Coupon;
use crate::earnings::InstructorEarnings;
use crate::enrollment::Enrollment;
use crate::fees::PaymentMethod;
use crate::instructor::{InstructorFiscalProfile, InstructorPaymentConfig};
use crate::notification::{NotificationSink, UserNotification};
use crate::refund::{Refund, RefundStatus};
use crate::sale::{ProductKind, ProductRef, Sale, SaleItem, SaleStatus};
use crate::store::{SettlementStore, WalletCredit};
use crate::wallet::{Wallet, WalletTransaction};

/// Postgres-backed settlement store. Uniqueness and sorted-delete guarantees
/// live in SQL so they hold across processes, not just within one.
#[derive(Clone)]
pub struct PgSettlementStore {
    pool: PgPool,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates every settlement table and index. Safe to run on every boot.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let tables: &[(&str, &[&str])] = &[
        (Sale::create_table_sql(), Sale::indexes_sql()),
        (Refund::create_table_sql(), Refund::indexes_sql()),
        (InstructorEarnings::create_table_sql(), InstructorEarnings::indexes_sql()),
        (Wallet::create_table_sql(), Wallet::indexes_sql()),
        (WalletTransaction::create_table_sql(), WalletTransaction::indexes_sql()),
        (Enrollment::create_table_sql(), Enrollment::indexes_sql()),
        (Coupon::create_table_sql(), Coupon::indexes_sql()),
        (Campaign::create_table_sql(), Campaign::indexes_sql()),
        (UserNotification::create_table_sql(), UserNotification::indexes_sql()),
        (InstructorFiscalProfile::create_table_sql(), InstructorFiscalProfile::indexes_sql()),
        (InstructorPaymentConfig::create_table_sql(), InstructorPaymentConfig::indexes_sql()),
    ];

    for (create_sql, indexes) in tables {
        sqlx::query(create_sql).execute(pool).await?;
        for index_sql in *indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }
    }
    tracing::info!("[run_migrations] settlement schema is up to date");
    Ok(())
}

fn parse_text<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|err| anyhow!("[PgSettlementStore] bad {} value {:?}: {}", column, raw, err))
}

fn sale_from_row(row: &PgRow) -> Result<Sale> {
    Ok(Sale {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total: row.try_get("total")?,
        currency: row.try_get("currency")?,
        status: parse_text::<SaleStatus>(row, "status")?,
        payment_method: parse_text::<PaymentMethod>(row, "payment_method")?,
        items: row.try_get::<Json<Vec<SaleItem>>, _>("items")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn refund_from_row(row: &PgRow) -> Result<Refund> {
    Ok(Refund {
        id: row.try_get("id")?,
        sale_id: row.try_get("sale_id")?,
        user_id: row.try_get("user_id")?,
        item: SaleItem {
            product: ProductRef {
                product_type: parse_text::<ProductKind>(row, "product_type")?,
                product_id: row.try_get("product_id")?,
            },
            title: row.try_get("title")?,
            price_unit: row.try_get("price_unit")?,
        },
        reason: row.try_get("reason")?,
        status: parse_text::<RefundStatus>(row, "status")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn earnings_from_row(row: &PgRow) -> Result<InstructorEarnings> {
    Ok(InstructorEarnings {
        id: row.try_get("id")?,
        instructor_id: row.try_get("instructor_id")?,
        sale_id: row.try_get("sale_id")?,
        product: ProductRef {
            product_type: parse_text::<ProductKind>(row, "product_type")?,
            product_id: row.try_get("product_id")?,
        },
        gross_earning: row.try_get("gross_earning")?,
        processor_fee: row.try_get("processor_fee")?,
        commission_rate: row.try_get("commission_rate")?,
        platform_commission: row.try_get("platform_commission")?,
        net_earning: row.try_get("net_earning")?,
        status: parse_text::<crate::earnings::EarningsStatus>(row, "status")?,
        refund_id: row.try_get("refund_id")?,
        refunded_at: row.try_get("refunded_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn fiscal_profile_from_row(row: &PgRow) -> Result<InstructorFiscalProfile> {
    Ok(InstructorFiscalProfile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        country_code: row.try_get("country_code")?,
        regime_code: row.try_get("regime_code")?,
        payout_currency: row.try_get("payout_currency")?,
        payout_method: parse_text::<PaymentMethod>(row, "payout_method")?,
        accumulated_income_ytd: row.try_get("accumulated_income_ytd")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payment_config_from_row(row: &PgRow) -> Result<InstructorPaymentConfig> {
    Ok(InstructorPaymentConfig {
        id: row.try_get("id")?,
        instructor_id: row.try_get("instructor_id")?,
        processor_account_id: row.try_get("processor_account_id")?,
        charges_enabled: row.try_get("charges_enabled")?,
        payouts_enabled: row.try_get("payouts_enabled")?,
        onboarding_complete: row.try_get("onboarding_complete")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn active_status_strings() -> Vec<String> {
    RefundStatus::active().iter().map(|status| status.to_string()).collect()
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn sale_by_id(&self, sale_id: Uuid) -> Result<Option<Sale>> {
        let row = sqlx::query(r#"SELECT * FROM "sales" WHERE "id" = $1"#)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(sale_from_row).transpose()
    }

    async fn has_active_refund(&self, sale_id: Uuid, product: &ProductRef) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                SELECT 1 FROM "refunds"
                WHERE "sale_id" = $1 AND "product_id" = $2 AND "product_type" = $3
                  AND "status" = ANY($4)
            )"#,
        )
        .bind(sale_id)
        .bind(product.product_id)
        .bind(product.product_type.to_string())
        .bind(active_status_strings())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_refund_if_absent(&self, refund: Refund) -> Result<Option<Refund>> {
        // Single-statement check-and-insert; the partial unique index backs
        // it up if two of these race.
        let row = sqlx::query(
            r#"INSERT INTO "refunds" (
                "id", "sale_id", "user_id", "product_id", "product_type",
                "title", "price_unit", "reason", "status",
                "created_at", "updated_at"
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
            WHERE NOT EXISTS (
                SELECT 1 FROM "refunds"
                WHERE "sale_id" = $2 AND "product_id" = $4 AND "product_type" = $5
                  AND "status" = ANY($12)
            )
            RETURNING *"#,
        )
        .bind(refund.id)
        .bind(refund.sale_id)
        .bind(refund.user_id)
        .bind(refund.item.product.product_id)
        .bind(refund.item.product.product_type.to_string())
        .bind(&refund.item.title)
        .bind(refund.item.price_unit)
        .bind(&refund.reason)
        .bind(refund.status.to_string())
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .bind(active_status_strings())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn refund_by_id(&self, refund_id: Uuid) -> Result<Option<Refund>> {
        let row = sqlx::query(r#"SELECT * FROM "refunds" WHERE "id" = $1"#)
            .bind(refund_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn update_refund(&self, refund: &Refund) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE "refunds"
            SET "status" = $2, "reviewed_by" = $3, "reviewed_at" = $4, "updated_at" = $5
            WHERE "id" = $1"#,
        )
        .bind(refund.id)
        .bind(refund.status.to_string())
        .bind(refund.reviewed_by)
        .bind(refund.reviewed_at)
        .bind(refund.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("[PgSettlementStore::update_refund] refund {} not found", refund.id);
        }
        Ok(())
    }

    async fn completed_refund_count(&self, user_id: Uuid, product: &ProductRef) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM "refunds"
            WHERE "user_id" = $1 AND "product_id" = $2 AND "product_type" = $3
              AND "status" = $4"#,
        )
        .bind(user_id)
        .bind(product.product_id)
        .bind(product.product_type.to_string())
        .bind(RefundStatus::Completed.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn earnings_for_sale_item(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<InstructorEarnings>> {
        let row = sqlx::query(
            r#"SELECT * FROM "instructor_earnings" WHERE "sale_id" = $1 AND "product_id" = $2"#,
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(earnings_from_row).transpose()
    }

    async fn update_earnings(&self, earnings: &InstructorEarnings) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE "instructor_earnings"
            SET "status" = $2, "refund_id" = $3, "refunded_at" = $4, "updated_at" = $5
            WHERE "id" = $1"#,
        )
        .bind(earnings.id)
        .bind(earnings.status.to_string())
        .bind(earnings.refund_id)
        .bind(earnings.refunded_at)
        .bind(earnings.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!(
                "[PgSettlementStore::update_earnings] earnings {} not found",
                earnings.id
            );
        }
        Ok(())
    }

    async fn credit_wallet(
        &self,
        user_id: Uuid,
        credit: WalletCredit,
    ) -> Result<WalletTransaction> {
        let now = get_current_timestamp();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"INSERT INTO "wallets" ("id", "user_id", "balance", "created_at", "updated_at")
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT ("user_id") DO UPDATE
            SET "balance" = "wallets"."balance" + EXCLUDED."balance",
                "updated_at" = EXCLUDED."updated_at"
            RETURNING "id", "balance""#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(credit.amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let wallet = Wallet {
            id: row.try_get("id")?,
            user_id,
            balance: row.try_get("balance")?,
            created_at: now,
            updated_at: now,
        };
        let transaction = credit.into_transaction(&wallet, now);

        sqlx::query(
            r#"INSERT INTO "wallet_transactions" (
                "id", "wallet_id", "user_id", "transaction_type",
                "amount", "balance_after", "description", "metadata", "created_at"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(transaction.id)
        .bind(transaction.wallet_id)
        .bind(transaction.user_id)
        .bind(transaction.transaction_type.to_string())
        .bind(transaction.amount)
        .bind(transaction.balance_after)
        .bind(&transaction.description)
        .bind(Json(transaction.metadata.clone()))
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn revoke_latest_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM "enrollments"
            WHERE "id" = (
                SELECT "id" FROM "enrollments"
                WHERE "user_id" = $1 AND "course_id" = $2
                ORDER BY "created_at" DESC, "id" DESC
                LIMIT 1
            )"#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_campaign(&self, campaign: Campaign) -> Result<Option<Campaign>> {
        let mut tx = self.pool.begin().await?;

        let overlapping: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                SELECT 1 FROM "campaigns"
                WHERE "campaign_type" = $1 AND "segment" = $2
                  AND "starts_at" <= $3 AND "ends_at" >= $4
            )"#,
        )
        .bind(campaign.campaign_type.to_string())
        .bind(Json(&campaign.segment))
        .bind(campaign.ends_at)
        .bind(campaign.starts_at)
        .fetch_one(&mut *tx)
        .await?;
        if overlapping {
            return Ok(None);
        }

        sqlx::query(
            r#"INSERT INTO "campaigns" (
                "id", "name", "campaign_type", "segment", "discount",
                "starts_at", "ends_at", "created_at", "updated_at"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(campaign.campaign_type.to_string())
        .bind(Json(&campaign.segment))
        .bind(Json(&campaign.discount))
        .bind(campaign.starts_at)
        .bind(campaign.ends_at)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(campaign))
    }

    async fn instructor_fiscal_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<InstructorFiscalProfile>> {
        let row =
            sqlx::query(r#"SELECT * FROM "instructor_fiscal_profiles" WHERE "user_id" = $1"#)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(fiscal_profile_from_row).transpose()
    }

    async fn instructor_payment_config(
        &self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorPaymentConfig>> {
        let row =
            sqlx::query(r#"SELECT * FROM "instructor_payment_configs" WHERE "instructor_id" = $1"#)
                .bind(instructor_id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(payment_config_from_row).transpose()
    }
}

/// Persists notifications as rows; the delivery fan-out (mail, push) tails
/// the table elsewhere.
#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn dispatch(&self, notification: UserNotification) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO "user_notifications" (
                "id", "from", "to", "notification_type", "content",
                "related_sale", "related_refund", "created_at", "updated_at"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(notification.id)
        .bind(notification.from)
        .bind(notification.to)
        .bind(notification.notification_type.to_string())
        .bind(&notification.content)
        .bind(notification.related_sale)
        .bind(notification.related_refund)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use crate::sale::ProductRef;
use crate::split::SplitBreakdown;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EarningsStatus {
    #[default]
    Pending,
    Available,
    Paid,
    Completed,
    Refunded,
}

/// What an instructor is owed (or was paid) for one sold line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorEarnings {
    pub id: Uuid,

    pub instructor_id: Uuid,
    pub sale_id: Uuid,
    pub product: ProductRef,

    pub gross_earning: f64,
    pub processor_fee: f64,
    pub commission_rate: f64,
    pub platform_commission: f64,
    pub net_earning: f64,

    pub status: EarningsStatus,
    pub refund_id: Option<Uuid>,
    pub refunded_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl InstructorEarnings {
    pub fn from_split(
        instructor_id: Uuid,
        sale_id: Uuid,
        product: ProductRef,
        sale_price: f64,
        commission_rate: f64,
        split: &SplitBreakdown,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instructor_id,
            sale_id,
            product,
            gross_earning: sale_price,
            processor_fee: split.fee,
            commission_rate,
            platform_commission: split.platform_commission,
            net_earning: split.instructor_earning,
            status: EarningsStatus::Pending,
            refund_id: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Earnings already settled with the instructor cannot be clawed back.
    pub fn is_locked(&self) -> bool {
        matches!(self.status, EarningsStatus::Paid | EarningsStatus::Completed)
    }

    pub fn mark_refunded(&mut self, refund_id: Uuid, now: i64) -> Result<()> {
        match self.status {
            EarningsStatus::Pending | EarningsStatus::Available => {
                self.status = EarningsStatus::Refunded;
                self.refund_id = Some(refund_id);
                self.refunded_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
            other => anyhow::bail!(
                "[InstructorEarnings::mark_refunded] cannot refund earnings in status {}",
                other
            ),
        }
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "instructor_earnings" (
            "id" UUID PRIMARY KEY,
            "instructor_id" UUID NOT NULL,
            "sale_id" UUID NOT NULL,
            "product_id" UUID NOT NULL,
            "product_type" TEXT NOT NULL,
            "gross_earning" DOUBLE PRECISION NOT NULL,
            "processor_fee" DOUBLE PRECISION NOT NULL,
            "commission_rate" DOUBLE PRECISION NOT NULL,
            "platform_commission" DOUBLE PRECISION NOT NULL,
            "net_earning" DOUBLE PRECISION NOT NULL,
            "status" TEXT NOT NULL,
            "refund_id" UUID,
            "refunded_at" BIGINT,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx_earnings_sale_product" ON "instructor_earnings" ("sale_id", "product_id");"#,
            r#"CREATE INDEX IF NOT EXISTS "idx_earnings_instructor_status" ON "instructor_earnings" ("instructor_id", "status");"#,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::PaymentMethod;
    use crate::sale::ProductKind;
    use crate::split::{recalculate_split, PLATFORM_COMMISSION_RATE};

    fn earnings_with_status(status: EarningsStatus) -> InstructorEarnings {
        let split = recalculate_split(100.0, PaymentMethod::Card, PLATFORM_COMMISSION_RATE);
        let mut earnings = InstructorEarnings::from_split(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ProductRef { product_type: ProductKind::Course, product_id: Uuid::new_v4() },
            100.0,
            PLATFORM_COMMISSION_RATE,
            &split,
            1000,
        );
        earnings.status = status;
        earnings
    }

    #[test]
    fn refund_only_from_unsettled_states() {
        for status in [EarningsStatus::Pending, EarningsStatus::Available] {
            let mut earnings = earnings_with_status(status);
            let refund_id = Uuid::new_v4();
            earnings.mark_refunded(refund_id, 2000).unwrap();
            assert_eq!(earnings.status, EarningsStatus::Refunded);
            assert_eq!(earnings.refund_id, Some(refund_id));
            assert_eq!(earnings.refunded_at, Some(2000));
        }

        for status in
            [EarningsStatus::Paid, EarningsStatus::Completed, EarningsStatus::Refunded]
        {
            let mut earnings = earnings_with_status(status);
            assert!(earnings.mark_refunded(Uuid::new_v4(), 2000).is_err());
        }
    }

    #[test]
    fn settled_states_are_locked() {
        assert!(earnings_with_status(EarningsStatus::Paid).is_locked());
        assert!(earnings_with_status(EarningsStatus::Completed).is_locked());
        assert!(!earnings_with_status(EarningsStatus::Available).is_locked());
        assert!(!earnings_with_status(EarningsStatus::Pending).is_locked());
    }
}

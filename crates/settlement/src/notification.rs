use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use aula_common::get_current_timestamp;

use crate::refund::Refund;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum NotificationType {
    #[default]
    SystemNotification,

    RefundRequested,
    RefundApproved,
    RefundRejected,

    PayoutProcessed,
    TaxLimitAlert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotification {
    pub id: Uuid,

    pub from: Option<Uuid>,
    pub to: Option<Uuid>,

    pub notification_type: NotificationType,
    pub content: Option<String>,

    pub related_sale: Option<Uuid>,
    pub related_refund: Option<Uuid>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserNotification {
    fn base(notification_type: NotificationType) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            from: None,
            to: None,
            notification_type,
            content: None,
            related_sale: None,
            related_refund: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn refund_requested(user_id: Uuid, refund: &Refund) -> Self {
        Self {
            to: Some(user_id),
            content: Some(format!(
                "We received your refund request for \"{}\"",
                refund.item.title
            )),
            related_sale: Some(refund.sale_id),
            related_refund: Some(refund.id),
            ..Self::base(NotificationType::RefundRequested)
        }
    }

    pub fn refund_approved(user_id: Uuid, reviewer: Uuid, refund: &Refund) -> Self {
        Self {
            from: Some(reviewer),
            to: Some(user_id),
            content: Some(format!(
                "Your refund for \"{}\" was approved, {:.2} was credited to your wallet",
                refund.item.title, refund.item.price_unit
            )),
            related_sale: Some(refund.sale_id),
            related_refund: Some(refund.id),
            ..Self::base(NotificationType::RefundApproved)
        }
    }

    pub fn refund_rejected(user_id: Uuid, reviewer: Uuid, refund: &Refund) -> Self {
        Self {
            from: Some(reviewer),
            to: Some(user_id),
            content: Some(format!(
                "Your refund request for \"{}\" was rejected",
                refund.item.title
            )),
            related_sale: Some(refund.sale_id),
            related_refund: Some(refund.id),
            ..Self::base(NotificationType::RefundRejected)
        }
    }

    pub fn payout_processed(instructor_user_id: Uuid, amount: f64, currency: &str) -> Self {
        Self {
            to: Some(instructor_user_id),
            content: Some(format!("Payout of {amount:.2} {currency} is on its way")),
            ..Self::base(NotificationType::PayoutProcessed)
        }
    }

    pub fn tax_limit_alert(instructor_user_id: Uuid, message: String) -> Self {
        Self {
            to: Some(instructor_user_id),
            content: Some(message),
            ..Self::base(NotificationType::TaxLimitAlert)
        }
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "user_notifications" (
            "id" UUID PRIMARY KEY,
            "from" UUID,
            "to" UUID,
            "notification_type" TEXT NOT NULL,
            "content" TEXT,
            "related_sale" UUID,
            "related_refund" UUID,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[r#"CREATE INDEX IF NOT EXISTS "idx_user_notifications_to" ON "user_notifications" ("to", "created_at");"#]
    }
}

/// Delivery seam. Dispatch is best-effort everywhere in settlement: a failed
/// notification is logged by the caller and never fails the operation that
/// produced it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, notification: UserNotification) -> Result<()>;
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use aula_common::get_current_timestamp;

use crate::notification::{NotificationSink, UserNotification};
use crate::sale::{ProductKind, ProductRef, SaleItem};
use crate::store::{SettlementStore, WalletCredit};

/// Days after the sale during which a refund may be requested.
pub const REFUND_DAYS_LIMIT: i64 = 7;
/// Completed refunds allowed per user and product, lifetime.
pub const MAX_REFUNDS_PER_PRODUCT: i64 = 2;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Pending,
    /// Written by external payment-provider flows while a provider-side
    /// reversal is in flight. Blocks duplicates like `Pending` does.
    Processing,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RefundStatus::Pending | RefundStatus::Approved | RefundStatus::Processing)
    }

    pub fn active() -> [RefundStatus; 3] {
        [RefundStatus::Pending, RefundStatus::Approved, RefundStatus::Processing]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,

    pub sale_id: Uuid,
    pub user_id: Uuid,
    /// Snapshot of the sold line item the refund targets.
    pub item: SaleItem,

    pub reason: String,
    pub status: RefundStatus,

    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Refund {
    pub fn requested(user_id: Uuid, sale_id: Uuid, item: SaleItem, reason: String) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            sale_id,
            user_id,
            item,
            reason,
            status: RefundStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "refunds" (
            "id" UUID PRIMARY KEY,
            "sale_id" UUID NOT NULL,
            "user_id" UUID NOT NULL,
            "product_id" UUID NOT NULL,
            "product_type" TEXT NOT NULL,
            "title" TEXT NOT NULL,
            "price_unit" DOUBLE PRECISION NOT NULL,
            "reason" TEXT NOT NULL,
            "status" TEXT NOT NULL,
            "reviewed_by" UUID,
            "reviewed_at" BIGINT,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[
            // Storage-level guarantee behind the single-active-refund rule.
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx_refunds_active_unique" ON "refunds" ("sale_id", "product_id", "product_type") WHERE "status" IN ('pending', 'approved', 'processing');"#,
            r#"CREATE INDEX IF NOT EXISTS "idx_refunds_user_product" ON "refunds" ("user_id", "product_id", "product_type", "status");"#,
        ]
    }
}

/// Stable machine-readable codes; callers branch on these, not on error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectionReason {
    SaleNotFound,
    ItemNotInSale,
    RefundWindowExpired,
    RefundAlreadyActive,
    MaxRefundsReached,
    InstructorAlreadyPaid,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::SaleNotFound => "We could not find that purchase on your account",
            RejectionReason::ItemNotInSale => "That product is not part of this purchase",
            RejectionReason::RefundWindowExpired => {
                "The refund window for this purchase has closed"
            }
            RejectionReason::RefundAlreadyActive => {
                "A refund request for this product is already being reviewed"
            }
            RejectionReason::MaxRefundsReached => {
                "This product has reached its refund limit for your account"
            }
            RejectionReason::InstructorAlreadyPaid => {
                "This purchase has already been settled with the instructor and can no longer be refunded"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRejection {
    pub reason: RejectionReason,
    pub message: String,
}

impl From<RejectionReason> for RefundRejection {
    fn from(reason: RejectionReason) -> Self {
        Self { reason, message: reason.message().to_string() }
    }
}

#[derive(Debug, Clone)]
pub enum RefundRequestOutcome {
    Accepted(Refund),
    Rejected(RefundRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone)]
pub enum RefundReviewOutcome {
    /// Approved, wallet credited, earnings reconciled.
    Completed(Refund),
    Rejected(Refund),
    /// Approval refused; the refund is left pending.
    Blocked(RefundRejection),
}

#[derive(Debug, thiserror::Error)]
pub enum RefundError {
    #[error("[RefundService] refund {0} not found")]
    NotFound(Uuid),
    #[error("[RefundService] refund {0} was already reviewed as {1}")]
    AlreadyReviewed(Uuid, RefundStatus),
    /// Crediting the wallet is what "refund completed" means; when it fails
    /// the whole approval aborts.
    #[error("[RefundService] wallet credit failed, approval aborted: {0}")]
    WalletCredit(anyhow::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct RefundService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S: SettlementStore, N: NotificationSink> RefundService<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Opens a refund request for one line item of one sale.
    ///
    /// Precondition failures come back as `Rejected` values with a stable
    /// reason code; only storage trouble is an `Err`.
    pub async fn request_refund(
        &self,
        user_id: Uuid,
        sale_id: Uuid,
        product: ProductRef,
        reason: impl Into<String>,
    ) -> Result<RefundRequestOutcome, RefundError> {
        let rejected = |reason: RejectionReason| {
            Ok(RefundRequestOutcome::Rejected(RefundRejection::from(reason)))
        };

        let Some(sale) = self.store.sale_by_id(sale_id).await? else {
            return rejected(RejectionReason::SaleNotFound);
        };
        if sale.user_id != user_id {
            return rejected(RejectionReason::SaleNotFound);
        }

        let Some(item) = sale.find_item(&product) else {
            return rejected(RejectionReason::ItemNotInSale);
        };
        let item = item.clone();

        if !sale.refund_window_open(get_current_timestamp()) {
            return rejected(RejectionReason::RefundWindowExpired);
        }

        if self.store.has_active_refund(sale_id, &product).await? {
            return rejected(RejectionReason::RefundAlreadyActive);
        }

        if self.store.completed_refund_count(user_id, &product).await?
            >= MAX_REFUNDS_PER_PRODUCT
        {
            return rejected(RejectionReason::MaxRefundsReached);
        }

        // Advisory here; checked again with fresh state at approval time,
        // since payout jobs may settle the earnings in between.
        if let Some(earnings) =
            self.store.earnings_for_sale_item(sale_id, product.product_id).await?
        {
            if earnings.is_locked() {
                return rejected(RejectionReason::InstructorAlreadyPaid);
            }
        }

        let refund = Refund::requested(user_id, sale_id, item, reason.into());
        let Some(refund) = self.store.insert_refund_if_absent(refund).await? else {
            // Lost the race against a concurrent request for the same item.
            return rejected(RejectionReason::RefundAlreadyActive);
        };

        self.notify(UserNotification::refund_requested(user_id, &refund)).await;
        Ok(RefundRequestOutcome::Accepted(refund))
    }

    /// Settles a pending refund one way or the other.
    ///
    /// Approval order matters: the wallet credit goes first and is the only
    /// step allowed to abort the review; everything after it must stick.
    pub async fn review_refund(
        &self,
        refund_id: Uuid,
        decision: ReviewDecision,
        reviewer: Uuid,
    ) -> Result<RefundReviewOutcome, RefundError> {
        let mut refund = self
            .store
            .refund_by_id(refund_id)
            .await?
            .ok_or(RefundError::NotFound(refund_id))?;

        if refund.status != RefundStatus::Pending {
            return Err(RefundError::AlreadyReviewed(refund_id, refund.status));
        }

        let now = get_current_timestamp();

        if decision == ReviewDecision::Rejected {
            refund.status = RefundStatus::Rejected;
            refund.reviewed_by = Some(reviewer);
            refund.reviewed_at = Some(now);
            refund.updated_at = now;
            self.store.update_refund(&refund).await?;

            self.notify(UserNotification::refund_rejected(refund.user_id, reviewer, &refund))
                .await;
            return Ok(RefundReviewOutcome::Rejected(refund));
        }

        // Fresh read, not the request-time result: a payout job may have
        // settled these earnings while the request sat in review.
        let earnings = self
            .store
            .earnings_for_sale_item(refund.sale_id, refund.item.product.product_id)
            .await?;
        if earnings.as_ref().is_some_and(|earnings| earnings.is_locked()) {
            return Ok(RefundReviewOutcome::Blocked(RefundRejection::from(
                RejectionReason::InstructorAlreadyPaid,
            )));
        }

        self.store
            .credit_wallet(refund.user_id, WalletCredit::refund(&refund))
            .await
            .map_err(RefundError::WalletCredit)?;

        if let Some(mut earnings) = earnings {
            earnings.mark_refunded(refund.id, now)?;
            self.store.update_earnings(&earnings).await?;
        }

        refund.status = RefundStatus::Completed;
        refund.reviewed_by = Some(reviewer);
        refund.reviewed_at = Some(now);
        refund.updated_at = now;
        self.store.update_refund(&refund).await?;

        if refund.item.product.product_type == ProductKind::Course {
            let revoked = self
                .store
                .revoke_latest_enrollment(refund.user_id, refund.item.product.product_id)
                .await?;
            if revoked == 0 {
                tracing::warn!(
                    "[RefundService::review_refund] no enrollment to revoke for user {} course {}",
                    refund.user_id,
                    refund.item.product.product_id
                );
            }
        }

        self.notify(UserNotification::refund_approved(refund.user_id, reviewer, &refund))
            .await;
        Ok(RefundReviewOutcome::Completed(refund))
    }

    async fn notify(&self, notification: UserNotification) {
        if let Err(err) = self.notifier.dispatch(notification).await {
            tracing::warn!("[RefundService::notify] notification dispatch failed: {err:#}");
        }
    }
}

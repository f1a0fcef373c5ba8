mod memory;
mod postgres;

pub use memory::{MemoryNotificationSink, MemorySettlementStore};
pub use postgres::{run_migrations, PgNotificationSink, PgSettlementStore};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use sqlx::types::Uuid;

use crate::campaign::Campaign;
use crate::earnings::InstructorEarnings;
use crate::instructor::{InstructorFiscalProfile, InstructorPaymentConfig};
use crate::refund::Refund;
use crate::sale::{ProductRef, Sale};
use crate::wallet::{Wallet, WalletTransaction, WalletTransactionType};

/// A balance credit plus the ledger entry describing it. The store applies
/// both atomically; there is no API to touch one without the other.
#[derive(Debug, Clone)]
pub struct WalletCredit {
    pub amount: f64,
    pub transaction_type: WalletTransactionType,
    pub description: String,
    pub metadata: serde_json::Value,
}

impl WalletCredit {
    pub fn refund(refund: &Refund) -> Self {
        Self {
            amount: refund.item.price_unit,
            transaction_type: WalletTransactionType::RefundCredit,
            description: format!("Refund: {}", refund.item.title),
            metadata: json!({
                "refund_id": refund.id,
                "sale_id": refund.sale_id,
                "product_id": refund.item.product.product_id,
                "product_type": refund.item.product.product_type,
            }),
        }
    }

    pub fn into_transaction(self, wallet: &Wallet, now: i64) -> WalletTransaction {
        WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            user_id: wallet.user_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            balance_after: wallet.balance,
            description: self.description,
            metadata: self.metadata,
            created_at: now,
        }
    }
}

/// Storage operations the settlement flows need. The contract matters more
/// than the backend: check-and-insert and sorted delete are single atomic
/// operations, never a read followed by a separate write.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn sale_by_id(&self, sale_id: Uuid) -> Result<Option<Sale>>;

    /// Advisory read; `insert_refund_if_absent` is the authoritative gate.
    async fn has_active_refund(&self, sale_id: Uuid, product: &ProductRef) -> Result<bool>;

    /// Atomic check-and-insert: returns `None`, inserting nothing, when an
    /// active refund already exists for the same `(sale, product)` key.
    async fn insert_refund_if_absent(&self, refund: Refund) -> Result<Option<Refund>>;

    async fn refund_by_id(&self, refund_id: Uuid) -> Result<Option<Refund>>;

    async fn update_refund(&self, refund: &Refund) -> Result<()>;

    async fn completed_refund_count(&self, user_id: Uuid, product: &ProductRef) -> Result<i64>;

    async fn earnings_for_sale_item(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<InstructorEarnings>>;

    async fn update_earnings(&self, earnings: &InstructorEarnings) -> Result<()>;

    /// Applies the balance update and appends the ledger entry together;
    /// partial application must be impossible.
    async fn credit_wallet(&self, user_id: Uuid, credit: WalletCredit)
        -> Result<WalletTransaction>;

    /// Deletes the most recently created enrollment for `(user, course)` as
    /// one sorted find-and-delete. Returns the number of rows removed (0 or 1).
    async fn revoke_latest_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<u64>;

    /// Returns `None` when a campaign of the same type and segment already
    /// covers an overlapping window.
    async fn create_campaign(&self, campaign: Campaign) -> Result<Option<Campaign>>;

    async fn instructor_fiscal_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<InstructorFiscalProfile>>;

    async fn instructor_payment_config(
        &self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorPaymentConfig>>;
}

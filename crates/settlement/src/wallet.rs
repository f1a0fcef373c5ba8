use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use aula_common::get_current_timestamp;

use crate::money::round2;

/// Store credit. Balance only ever grows through this core; spending happens
/// at checkout, outside of settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Wallet {
    pub fn new(user_id: Uuid) -> Self {
        let now = get_current_timestamp();
        Self { id: Uuid::new_v4(), user_id, balance: 0.0, created_at: now, updated_at: now }
    }

    /// Returns the balance after the credit.
    pub fn credit(&mut self, amount: f64, now: i64) -> f64 {
        self.balance = round2(self.balance + amount);
        self.updated_at = now;
        self.balance
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "wallets" (
            "id" UUID PRIMARY KEY,
            "user_id" UUID NOT NULL UNIQUE,
            "balance" DOUBLE PRECISION NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[]
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WalletTransactionType {
    #[default]
    RefundCredit,
    PromotionalCredit,
    AdminAdjustment,
}

/// Append-only ledger entry behind every balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,

    pub transaction_type: WalletTransactionType,
    pub amount: f64,
    pub balance_after: f64,

    pub description: String,
    pub metadata: serde_json::Value,

    pub created_at: i64,
}

impl WalletTransaction {
    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "wallet_transactions" (
            "id" UUID PRIMARY KEY,
            "wallet_id" UUID NOT NULL,
            "user_id" UUID NOT NULL,
            "transaction_type" TEXT NOT NULL,
            "amount" DOUBLE PRECISION NOT NULL,
            "balance_after" DOUBLE PRECISION NOT NULL,
            "description" TEXT NOT NULL,
            "metadata" JSONB NOT NULL,
            "created_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[
            r#"CREATE INDEX IF NOT EXISTS "idx_wallet_transactions_wallet_id" ON "wallet_transactions" ("wallet_id", "created_at");"#,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_rounds_and_returns_new_balance() {
        let mut wallet = Wallet::new(Uuid::new_v4());
        assert_eq!(wallet.credit(10.005, 100), 10.01);
        assert_eq!(wallet.credit(89.99, 200), 100.0);
        assert_eq!(wallet.updated_at, 200);
    }
}

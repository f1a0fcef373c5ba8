use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use crate::fees::PaymentMethod;
use crate::fiscal::country_config;

/// Where and how an instructor is taxed and paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorFiscalProfile {
    pub id: Uuid,
    pub user_id: Uuid,

    pub country_code: String,
    pub regime_code: String,

    pub payout_currency: String,
    pub payout_method: PaymentMethod,

    /// Income settled so far this fiscal year, in the tax currency.
    pub accumulated_income_ytd: f64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl InstructorFiscalProfile {
    pub fn tax_currency(&self) -> &'static str {
        country_config(&self.country_code).tax_currency
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "instructor_fiscal_profiles" (
            "id" UUID PRIMARY KEY,
            "user_id" UUID NOT NULL UNIQUE,
            "country_code" TEXT NOT NULL,
            "regime_code" TEXT NOT NULL,
            "payout_currency" TEXT NOT NULL,
            "payout_method" TEXT NOT NULL,
            "accumulated_income_ytd" DOUBLE PRECISION NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[]
    }
}

/// External processor account state for an instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorPaymentConfig {
    pub id: Uuid,
    pub instructor_id: Uuid,

    pub processor_account_id: Option<String>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub onboarding_complete: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl InstructorPaymentConfig {
    pub fn can_receive_payouts(&self) -> bool {
        self.charges_enabled && self.payouts_enabled && self.onboarding_complete
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "instructor_payment_configs" (
            "id" UUID PRIMARY KEY,
            "instructor_id" UUID NOT NULL UNIQUE,
            "processor_account_id" TEXT,
            "charges_enabled" BOOLEAN NOT NULL,
            "payouts_enabled" BOOLEAN NOT NULL,
            "onboarding_complete" BOOLEAN NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payouts_require_full_onboarding() {
        let mut config = InstructorPaymentConfig {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            processor_account_id: Some("acct_123".to_string()),
            charges_enabled: true,
            payouts_enabled: true,
            onboarding_complete: true,
            created_at: 0,
            updated_at: 0,
        };
        assert!(config.can_receive_payouts());

        config.payouts_enabled = false;
        assert!(!config.can_receive_payouts());
    }

    #[test]
    fn tax_currency_comes_from_country_table() {
        let profile = InstructorFiscalProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            country_code: "MX".to_string(),
            regime_code: "626".to_string(),
            payout_currency: "USD".to_string(),
            payout_method: PaymentMethod::BankTransfer,
            accumulated_income_ytd: 0.0,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(profile.tax_currency(), "MXN");
    }
}

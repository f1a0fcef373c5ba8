use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use aula_common::{blake3_hex, get_current_timestamp};

use crate::sale::{ProductKind, ProductRef};

/// Instructor-owned discount code. A zero `discount_percent` makes the code a
/// referral code: it does not change the buyer's price, it rewires the
/// commission split in the instructor's favor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,

    pub instructor_id: Uuid,
    pub product_ids: Vec<Uuid>,
    pub product_type: ProductKind,

    /// Percentage points, 0..=100. Zero means referral mode.
    pub discount_percent: f64,
    pub expires_at: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Coupon {
    pub fn generate(
        instructor_id: Uuid,
        product_ids: Vec<Uuid>,
        product_type: ProductKind,
        discount_percent: f64,
        expires_at: i64,
    ) -> Self {
        let code_seed = Uuid::new_v4();
        let code = blake3_hex(code_seed.as_bytes())
            .chars()
            .take(12)
            .collect::<String>()
            .to_uppercase();

        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            code,
            instructor_id,
            product_ids,
            product_type,
            discount_percent,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_referral(&self) -> bool {
        self.discount_percent == 0.0
    }

    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }

    pub fn applies_to(&self, product: &ProductRef) -> bool {
        self.product_type == product.product_type && self.product_ids.contains(&product.product_id)
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "coupons" (
            "id" UUID PRIMARY KEY,
            "code" TEXT NOT NULL UNIQUE,
            "instructor_id" UUID NOT NULL,
            "product_ids" UUID[] NOT NULL,
            "product_type" TEXT NOT NULL,
            "discount_percent" DOUBLE PRECISION NOT NULL,
            "expires_at" BIGINT NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[r#"CREATE INDEX IF NOT EXISTS "idx_coupons_instructor_id" ON "coupons" ("instructor_id");"#]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_short_and_unique() {
        let a = Coupon::generate(Uuid::new_v4(), vec![], ProductKind::Course, 0.0, i64::MAX);
        let b = Coupon::generate(Uuid::new_v4(), vec![], ProductKind::Course, 0.0, i64::MAX);
        assert_eq!(a.code.len(), 12);
        assert_ne!(a.code, b.code);
        assert!(a.is_referral());
    }

    #[test]
    fn applicability_checks_type_owner_and_expiry() {
        let product_id = Uuid::new_v4();
        let coupon = Coupon::generate(
            Uuid::new_v4(),
            vec![product_id],
            ProductKind::Course,
            15.0,
            1_000,
        );

        let course = ProductRef { product_type: ProductKind::Course, product_id };
        let project = ProductRef { product_type: ProductKind::Project, product_id };
        assert!(coupon.applies_to(&course));
        assert!(!coupon.applies_to(&project));
        assert!(coupon.is_live(999));
        assert!(!coupon.is_live(1_000));
        assert!(!coupon.is_referral());
    }
}

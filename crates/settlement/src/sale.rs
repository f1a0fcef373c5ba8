use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use crate::fees::PaymentMethod;
use crate::refund::REFUND_DAYS_LIMIT;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductKind {
    Course,
    Project,
}

/// Single tagged product reference; every purchasable thing is either a
/// course or a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_type: ProductKind,
    pub product_id: Uuid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum SaleStatus {
    #[serde(rename = "Pendiente")]
    #[strum(serialize = "Pendiente")]
    #[default]
    Pending,
    #[serde(rename = "Pagado")]
    #[strum(serialize = "Pagado")]
    Paid,
    #[serde(rename = "Anulado")]
    #[strum(serialize = "Anulado")]
    Voided,
}

/// One purchased product at its sale-time price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    #[serde(flatten)]
    pub product: ProductRef,
    pub title: String,
    pub price_unit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub user_id: Uuid,

    pub total: f64,
    pub currency: String,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub items: Vec<SaleItem>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Sale {
    pub fn find_item(&self, product: &ProductRef) -> Option<&SaleItem> {
        self.items.iter().find(|item| item.product == *product)
    }

    pub fn refund_window_open(&self, now: i64) -> bool {
        now - self.created_at <= REFUND_DAYS_LIMIT * 24 * 60 * 60
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "sales" (
            "id" UUID PRIMARY KEY,
            "user_id" UUID NOT NULL,
            "total" DOUBLE PRECISION NOT NULL,
            "currency" TEXT NOT NULL,
            "status" TEXT NOT NULL,
            "payment_method" TEXT NOT NULL,
            "items" JSONB NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[
            r#"CREATE INDEX IF NOT EXISTS "idx_sales_user_id" ON "sales" ("user_id");"#,
            r#"CREATE INDEX IF NOT EXISTS "idx_sales_created_at" ON "sales" ("created_at");"#,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_with_created_at(created_at: i64) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            total: 100.0,
            currency: "MXN".to_string(),
            status: SaleStatus::Paid,
            payment_method: PaymentMethod::Card,
            items: vec![],
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn window_closes_one_second_past_the_limit() {
        let now = 1_700_000_000;
        let limit = REFUND_DAYS_LIMIT * 24 * 60 * 60;

        assert!(sale_with_created_at(now - limit).refund_window_open(now));
        assert!(!sale_with_created_at(now - limit - 1).refund_window_open(now));
        assert!(sale_with_created_at(now - (REFUND_DAYS_LIMIT - 1) * 24 * 60 * 60)
            .refund_window_open(now));
    }

    #[test]
    fn status_preserves_stored_spanish_values() {
        assert_eq!(SaleStatus::Pending.to_string(), "Pendiente");
        assert_eq!(SaleStatus::Paid.to_string(), "Pagado");
        assert_eq!(SaleStatus::Voided.to_string(), "Anulado");
        assert_eq!("Pagado".parse::<SaleStatus>().unwrap(), SaleStatus::Paid);
    }

    #[test]
    fn find_item_matches_on_type_and_id() {
        let course_id = Uuid::new_v4();
        let mut sale = sale_with_created_at(0);
        sale.items.push(SaleItem {
            product: ProductRef { product_type: ProductKind::Course, product_id: course_id },
            title: "Intro to Baking".to_string(),
            price_unit: 100.0,
        });

        let as_course = ProductRef { product_type: ProductKind::Course, product_id: course_id };
        let as_project = ProductRef { product_type: ProductKind::Project, product_id: course_id };
        assert!(sale.find_item(&as_course).is_some());
        assert!(sale.find_item(&as_project).is_none());
    }
}

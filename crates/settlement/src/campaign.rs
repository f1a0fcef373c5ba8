use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use crate::coupon::Coupon;
use crate::money::round2;
use crate::sale::{ProductKind, ProductRef};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignType {
    #[default]
    Seasonal,
    Flash,
    Launch,
}

/// What slice of the catalog a campaign prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "segment_type", content = "segment_id", rename_all = "snake_case")]
pub enum CampaignSegment {
    Course(Uuid),
    Category(Uuid),
    Project(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// Percentage points, 0..=100.
    Percent(f64),
    Fixed(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,

    pub campaign_type: CampaignType,
    pub segment: CampaignSegment,
    pub discount: DiscountValue,

    pub starts_at: i64,
    pub ends_at: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Campaign {
    pub fn is_live(&self, now: i64) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }

    /// Two campaigns collide when they share type and segment and their
    /// windows intersect. Creation of a colliding campaign is rejected.
    pub fn overlaps(&self, other: &Campaign) -> bool {
        self.campaign_type == other.campaign_type
            && self.segment == other.segment
            && self.starts_at <= other.ends_at
            && other.starts_at <= self.ends_at
    }

    pub fn segment_matches(&self, product: &ProductRef, category: Option<Uuid>) -> bool {
        match self.segment {
            CampaignSegment::Course(id) => {
                product.product_type == ProductKind::Course && product.product_id == id
            }
            CampaignSegment::Project(id) => {
                product.product_type == ProductKind::Project && product.product_id == id
            }
            CampaignSegment::Category(id) => category == Some(id),
        }
    }

    pub fn apply(&self, price: f64) -> f64 {
        let discounted = match self.discount {
            DiscountValue::Percent(pct) => price * (1.0 - pct / 100.0),
            DiscountValue::Fixed(off) => price - off,
        };
        round2(discounted.max(0.0))
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "campaigns" (
            "id" UUID PRIMARY KEY,
            "name" TEXT NOT NULL,
            "campaign_type" TEXT NOT NULL,
            "segment" JSONB NOT NULL,
            "discount" JSONB NOT NULL,
            "starts_at" BIGINT NOT NULL,
            "ends_at" BIGINT NOT NULL,
            "created_at" BIGINT NOT NULL,
            "updated_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[r#"CREATE INDEX IF NOT EXISTS "idx_campaigns_window" ON "campaigns" ("campaign_type", "starts_at", "ends_at");"#]
    }
}

/// Display/checkout price for one product: best live campaign first, then the
/// coupon discount on top. Referral coupons leave the price untouched.
pub fn resolve_checkout_price(
    base_price: f64,
    campaigns: &[Campaign],
    coupon: Option<&Coupon>,
    product: &ProductRef,
    category: Option<Uuid>,
    now: i64,
) -> f64 {
    let campaign_price = campaigns
        .iter()
        .filter(|campaign| campaign.is_live(now) && campaign.segment_matches(product, category))
        .map(|campaign| campaign.apply(base_price))
        .fold(base_price, f64::min);

    match coupon {
        Some(coupon)
            if coupon.is_live(now) && coupon.applies_to(product) && !coupon.is_referral() =>
        {
            round2(campaign_price * (1.0 - coupon.discount_percent / 100.0))
        }
        _ => campaign_price,
    }
}

use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use crate::coupon::Coupon;
use crate::earnings::InstructorEarnings;
use crate::fees::{card_processing_fee, PaymentMethod};
use crate::money::round2;
use crate::sale::SaleItem;

pub const PLATFORM_COMMISSION_RATE: f64 = 0.30;
/// Instructor-favorable split when the sale came through the instructor's
/// own referral code.
pub const REFERRAL_COMMISSION_RATE: f64 = 0.20;

pub const RATE_TOLERANCE: f64 = 0.001;
pub const EARNING_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SplitBreakdown {
    pub fee: f64,
    pub net_sale: f64,
    pub platform_commission: f64,
    pub instructor_earning: f64,
}

/// Gross sale price -> processor fee -> platform commission -> instructor
/// earning, rounded to 2 decimals at every step.
pub fn recalculate_split(
    sale_price: f64,
    payment_method: PaymentMethod,
    commission_rate: f64,
) -> SplitBreakdown {
    let fee = match payment_method {
        PaymentMethod::Wallet => 0.0,
        _ => round2(card_processing_fee(sale_price)),
    };
    let net_sale = round2(sale_price - fee);
    let platform_commission = round2(net_sale * commission_rate);
    let instructor_earning = round2(net_sale - platform_commission);

    SplitBreakdown { fee, net_sale, platform_commission, instructor_earning }
}

/// Commission rate for one sold item. The referral rate only kicks in when
/// the coupon is a live referral code owned by the selling instructor and
/// scoped to the sold product.
pub fn resolve_commission_rate(
    coupon: Option<&Coupon>,
    item: &SaleItem,
    instructor_id: &Uuid,
    now: i64,
) -> f64 {
    match coupon {
        Some(coupon)
            if coupon.is_referral()
                && coupon.instructor_id == *instructor_id
                && coupon.applies_to(&item.product)
                && coupon.is_live(now) =>
        {
            REFERRAL_COMMISSION_RATE
        }
        _ => PLATFORM_COMMISSION_RATE,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitAudit {
    Consistent,
    /// The stored row disagrees with a fresh recomputation beyond tolerance.
    /// Flagged for manual correction; the right rate is never guessed here.
    NeedsCorrection {
        expected: SplitBreakdown,
        stored_rate: f64,
        stored_earning: f64,
    },
}

pub fn audit_earning(
    earning: &InstructorEarnings,
    sale_price: f64,
    payment_method: PaymentMethod,
    expected_rate: f64,
) -> SplitAudit {
    let expected = recalculate_split(sale_price, payment_method, expected_rate);

    let rate_off = (earning.commission_rate - expected_rate).abs() > RATE_TOLERANCE;
    let earning_off =
        (earning.net_earning - expected.instructor_earning).abs() > EARNING_TOLERANCE;

    if rate_off || earning_off {
        SplitAudit::NeedsCorrection {
            expected,
            stored_rate: earning.commission_rate,
            stored_earning: earning.net_earning,
        }
    } else {
        SplitAudit::Consistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sale::{ProductKind, ProductRef};

    #[test]
    fn card_sale_at_platform_rate() {
        let split = recalculate_split(100.0, PaymentMethod::Card, PLATFORM_COMMISSION_RATE);
        assert_eq!(split.fee, 7.66);
        assert_eq!(split.net_sale, 92.34);
        assert_eq!(split.platform_commission, 27.70);
        assert_eq!(split.instructor_earning, 64.64);
    }

    #[test]
    fn card_sale_at_referral_rate() {
        let split = recalculate_split(100.0, PaymentMethod::Card, REFERRAL_COMMISSION_RATE);
        assert_eq!(split.fee, 7.66);
        assert_eq!(split.net_sale, 92.34);
        assert_eq!(split.platform_commission, 18.47);
        assert_eq!(split.instructor_earning, 73.87);
    }

    #[test]
    fn wallet_sale_has_no_processor_fee() {
        let split = recalculate_split(50.0, PaymentMethod::Wallet, PLATFORM_COMMISSION_RATE);
        assert_eq!(split.fee, 0.0);
        assert_eq!(split.net_sale, 50.0);
        assert_eq!(split.platform_commission, 15.0);
        assert_eq!(split.instructor_earning, 35.0);
    }

    #[test]
    fn split_is_idempotent() {
        let first = recalculate_split(199.99, PaymentMethod::Card, PLATFORM_COMMISSION_RATE);
        let second = recalculate_split(199.99, PaymentMethod::Card, PLATFORM_COMMISSION_RATE);
        assert_eq!(first, second);
    }

    #[test]
    fn split_conserves_the_sale_price() {
        let prices = [0.99, 10.0, 49.99, 100.0, 199.99, 999.99, 2500.0];
        let methods = [PaymentMethod::Card, PaymentMethod::Wallet, PaymentMethod::Paypal];
        let rates = [PLATFORM_COMMISSION_RATE, REFERRAL_COMMISSION_RATE];

        for price in prices {
            for method in methods {
                for rate in rates {
                    let split = recalculate_split(price, method, rate);
                    let total = split.fee + split.platform_commission + split.instructor_earning;
                    assert!(
                        (total - price).abs() <= 0.01 + 1e-9,
                        "split of {price} via {method} at {rate} does not add up: {total}"
                    );
                }
            }
        }
    }

    fn item_for(product: ProductRef) -> SaleItem {
        SaleItem { product, title: "Course".to_string(), price_unit: 100.0 }
    }

    #[test]
    fn referral_rate_requires_matching_owner_and_product() {
        let instructor = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let product = ProductRef { product_type: ProductKind::Course, product_id: course_id };
        let item = item_for(product);

        let referral =
            Coupon::generate(instructor, vec![course_id], ProductKind::Course, 0.0, i64::MAX);
        assert_eq!(
            resolve_commission_rate(Some(&referral), &item, &instructor, 100),
            REFERRAL_COMMISSION_RATE
        );

        // Someone else's code keeps the platform rate.
        let other = Uuid::new_v4();
        assert_eq!(
            resolve_commission_rate(Some(&referral), &item, &other, 100),
            PLATFORM_COMMISSION_RATE
        );

        // A plain discount coupon keeps the platform rate.
        let discount =
            Coupon::generate(instructor, vec![course_id], ProductKind::Course, 20.0, i64::MAX);
        assert_eq!(
            resolve_commission_rate(Some(&discount), &item, &instructor, 100),
            PLATFORM_COMMISSION_RATE
        );

        assert_eq!(
            resolve_commission_rate(None, &item, &instructor, 100),
            PLATFORM_COMMISSION_RATE
        );
    }

    #[test]
    fn audit_flags_rate_and_earning_drift() {
        let product = ProductRef { product_type: ProductKind::Course, product_id: Uuid::new_v4() };
        let split = recalculate_split(100.0, PaymentMethod::Card, PLATFORM_COMMISSION_RATE);
        let mut earnings = InstructorEarnings::from_split(
            Uuid::new_v4(),
            Uuid::new_v4(),
            product,
            100.0,
            PLATFORM_COMMISSION_RATE,
            &split,
            0,
        );

        assert_eq!(
            audit_earning(&earnings, 100.0, PaymentMethod::Card, PLATFORM_COMMISSION_RATE),
            SplitAudit::Consistent
        );

        // Recorded at the referral rate but expected at the platform rate.
        assert!(matches!(
            audit_earning(&earnings, 100.0, PaymentMethod::Card, REFERRAL_COMMISSION_RATE),
            SplitAudit::NeedsCorrection { .. }
        ));

        earnings.net_earning += 0.05;
        assert!(matches!(
            audit_earning(&earnings, 100.0, PaymentMethod::Card, PLATFORM_COMMISSION_RATE),
            SplitAudit::NeedsCorrection { .. }
        ));
    }
}

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::money::round2;

pub const CARD_FEE_RATE: f64 = 0.036;
pub const CARD_FEE_FIXED: f64 = 3.00;
/// The acquirer invoices its fee with VAT on top; the gross-up keeps our
/// numbers in line with what actually gets debited.
pub const CARD_FEE_VAT_GROSS_UP: f64 = 1.16;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Paypal,
    Wallet,
    BankTransfer,
    Sepa,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentFee {
    /// Percentage points, e.g. 3.6 for 3.6%.
    pub rate_percent: f64,
    pub fixed_fee: f64,
    pub amount: f64,
}

/// Card acquirer fee for a charge of `amount`.
///
/// Reconciliation scripts recompute this exact expression against stored
/// fees; do not reorder or fold the constants.
pub fn card_processing_fee(amount: f64) -> f64 {
    (amount * CARD_FEE_RATE + CARD_FEE_FIXED) * CARD_FEE_VAT_GROSS_UP
}

/// Flat fee table per payout/charge method.
pub fn payment_fee(amount: f64, method: PaymentMethod) -> PaymentFee {
    let (rate_percent, fixed_fee) = match method {
        PaymentMethod::Card => (3.6, 3.00),
        PaymentMethod::Paypal => (2.9, 0.30),
        PaymentMethod::Wallet => (1.5, 0.0),
        PaymentMethod::BankTransfer => (0.0, 0.0),
        PaymentMethod::Sepa => (0.5, 0.0),
    };
    PaymentFee {
        rate_percent,
        fixed_fee,
        amount: round2(amount * rate_percent / 100.0 + fixed_fee),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_formula_is_verbatim() {
        let fee = card_processing_fee(100.0);
        assert!((fee - 7.656).abs() < 1e-9);
        assert_eq!(round2(fee), 7.66);
    }

    #[test]
    fn fee_table_per_method() {
        assert_eq!(payment_fee(1000.0, PaymentMethod::BankTransfer).amount, 0.0);
        assert_eq!(payment_fee(1000.0, PaymentMethod::Sepa).amount, 5.0);
        assert_eq!(payment_fee(1000.0, PaymentMethod::Wallet).amount, 15.0);
        assert_eq!(payment_fee(70.0, PaymentMethod::Paypal).amount, 2.33);

        let card = payment_fee(100.0, PaymentMethod::Card);
        assert_eq!(card.rate_percent, 3.6);
        assert_eq!(card.fixed_fee, 3.00);
        assert_eq!(card.amount, 6.6);
    }

    #[test]
    fn method_round_trips_through_text() {
        for method in [
            PaymentMethod::Card,
            PaymentMethod::Paypal,
            PaymentMethod::Wallet,
            PaymentMethod::BankTransfer,
            PaymentMethod::Sepa,
        ] {
            let parsed: PaymentMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
    }
}

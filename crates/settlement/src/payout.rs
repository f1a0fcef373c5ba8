use std::collections::HashMap;

use serde::Serialize;
use strum_macros::Display;

use crate::fees::{payment_fee, PaymentFee};
use crate::fiscal::{calculate_isr, calculate_vat, country_config, IsrWithholding, VatBreakdown};
use crate::instructor::InstructorFiscalProfile;
use crate::money::round2;

/// Rates quoted against a USD base: `rates["MXN"]` is MXN per USD.
pub type ExchangeRates = HashMap<String, f64>;

/// Identity on same-currency pairs; otherwise scales by the USD-base rate of
/// the target currency. A missing rate leaves the amount untouched rather
/// than failing a payout run.
pub fn convert(amount: f64, from: &str, to: &str, rates: &ExchangeRates) -> f64 {
    if from == to {
        return amount;
    }
    let rate = match rates.get(to) {
        Some(rate) => *rate,
        None => {
            tracing::warn!("[payout::convert] no rate for {}, keeping amount as-is", to);
            1.0
        }
    };
    round2(amount * rate)
}

pub struct PayoutParams<'a> {
    pub sale_amount_usd: f64,
    pub platform_commission_rate: f64,
    pub instructor: &'a InstructorFiscalProfile,
    pub rates: &'a ExchangeRates,
}

/// Full payout math for one settled sale. Every intermediate is exposed,
/// zero-valued when a step does not apply, because reconciliation tooling
/// reads the fields positionally.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutBreakdown {
    pub sale_amount_usd: f64,
    pub tax_currency: String,
    pub sale_amount_tax_currency: f64,

    pub platform_commission_rate: f64,
    pub platform_commission: f64,
    pub subtotal_after_commission: f64,

    pub vat_exclusive_subtotal: f64,
    pub vat: VatBreakdown,
    pub isr: IsrWithholding,

    pub net_before_conversion: f64,
    pub payout_currency: String,
    pub net_payout_currency: f64,
    pub payout_fee: PaymentFee,
    pub final_amount: f64,

    pub rates_used: ExchangeRates,
}

pub fn calculate_instructor_payout(params: PayoutParams<'_>) -> PayoutBreakdown {
    let instructor = params.instructor;
    let config = country_config(&instructor.country_code);
    let tax_currency = config.tax_currency;

    let sale_amount_tax_currency =
        convert(params.sale_amount_usd, "USD", tax_currency, params.rates);
    let platform_commission =
        round2(sale_amount_tax_currency * params.platform_commission_rate);
    let subtotal_after_commission = round2(sale_amount_tax_currency - platform_commission);

    // The commission-adjusted subtotal is VAT-inclusive in VAT countries;
    // back the VAT out before computing retention and income withholding.
    let (vat_exclusive_subtotal, vat) = if config.vat_rate > 0.0 {
        let exclusive = round2(subtotal_after_commission / (1.0 + config.vat_rate));
        let vat = calculate_vat(&instructor.country_code, &instructor.regime_code, exclusive);
        (exclusive, vat)
    } else {
        (subtotal_after_commission, VatBreakdown::default())
    };

    let isr = calculate_isr(
        &instructor.country_code,
        &instructor.regime_code,
        instructor.accumulated_income_ytd,
        vat_exclusive_subtotal,
    );

    let net_before_conversion =
        round2(vat_exclusive_subtotal + vat.vat_passed_through - isr.amount);
    let net_payout_currency = convert(
        net_before_conversion,
        tax_currency,
        &instructor.payout_currency,
        params.rates,
    );
    let payout_fee = payment_fee(net_payout_currency, instructor.payout_method);
    let final_amount = round2(net_payout_currency - payout_fee.amount);

    PayoutBreakdown {
        sale_amount_usd: params.sale_amount_usd,
        tax_currency: tax_currency.to_string(),
        sale_amount_tax_currency,
        platform_commission_rate: params.platform_commission_rate,
        platform_commission,
        subtotal_after_commission,
        vat_exclusive_subtotal,
        vat,
        isr,
        net_before_conversion,
        payout_currency: instructor.payout_currency.clone(),
        net_payout_currency,
        payout_fee,
        final_amount,
        rates_used: params.rates.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaxAlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxAlert {
    pub level: TaxAlertLevel,
    pub percentage: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxLimitCheck {
    pub can_continue: bool,
    pub percentage: f64,
    pub alerts: Vec<TaxAlert>,
}

impl TaxLimitCheck {
    fn unlimited() -> Self {
        Self { can_continue: true, percentage: 0.0, alerts: Vec::new() }
    }
}

/// Projects the instructor's annual income against the regime ceiling.
/// Warns from 80%, turns critical at 90%, and blocks at 100%.
pub fn validate_tax_limits(
    instructor: &InstructorFiscalProfile,
    income_to_add: f64,
) -> TaxLimitCheck {
    let config = country_config(&instructor.country_code);
    let Some(regime) = config.regimes.get(instructor.regime_code.as_str()) else {
        tracing::warn!(
            "[payout::validate_tax_limits] unknown regime {} for {}, skipping ceiling check",
            instructor.regime_code,
            config.code
        );
        return TaxLimitCheck::unlimited();
    };
    let Some(ceiling) = regime.income_ceiling else {
        return TaxLimitCheck::unlimited();
    };

    let percentage =
        round2((instructor.accumulated_income_ytd + income_to_add) / ceiling * 100.0);

    let mut can_continue = true;
    let mut alerts = Vec::new();
    if percentage >= 100.0 {
        can_continue = false;
        alerts.push(TaxAlert {
            level: TaxAlertLevel::Critical,
            percentage,
            message: format!("Annual income ceiling for {} reached", regime.name),
        });
    } else if percentage >= 90.0 {
        alerts.push(TaxAlert {
            level: TaxAlertLevel::Critical,
            percentage,
            message: format!(
                "At {percentage:.1}% of the annual income ceiling for {}",
                regime.name
            ),
        });
    } else if percentage >= 80.0 {
        alerts.push(TaxAlert {
            level: TaxAlertLevel::Warning,
            percentage,
            message: format!(
                "At {percentage:.1}% of the annual income ceiling for {}",
                regime.name
            ),
        });
    }

    TaxLimitCheck { can_continue, percentage, alerts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::PaymentMethod;
    use sqlx::types::Uuid;

    fn mx_resico(accumulated: f64, payout_currency: &str) -> InstructorFiscalProfile {
        InstructorFiscalProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            country_code: "MX".to_string(),
            regime_code: "626".to_string(),
            payout_currency: payout_currency.to_string(),
            payout_method: PaymentMethod::BankTransfer,
            accumulated_income_ytd: accumulated,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn test_rates() -> ExchangeRates {
        ExchangeRates::from([("USD".to_string(), 1.0), ("MXN".to_string(), 20.0)])
    }

    #[test]
    fn convert_is_identity_on_same_currency() {
        let rates = test_rates();
        assert_eq!(convert(123.45, "MXN", "MXN", &rates), 123.45);
        assert_eq!(convert(100.0, "USD", "MXN", &rates), 2000.0);
    }

    #[test]
    fn full_breakdown_for_a_vat_country() {
        let instructor = mx_resico(0.0, "MXN");
        let rates = test_rates();
        let breakdown = calculate_instructor_payout(PayoutParams {
            sale_amount_usd: 100.0,
            platform_commission_rate: 0.30,
            instructor: &instructor,
            rates: &rates,
        });

        assert_eq!(breakdown.sale_amount_tax_currency, 2000.0);
        assert_eq!(breakdown.platform_commission, 600.0);
        assert_eq!(breakdown.subtotal_after_commission, 1400.0);
        assert_eq!(breakdown.vat_exclusive_subtotal, 1206.90);
        assert_eq!(breakdown.vat.vat, 193.10);
        assert_eq!(breakdown.vat.vat_retained, 96.55);
        assert_eq!(breakdown.vat.vat_passed_through, 96.55);
        assert_eq!(breakdown.isr.rate, 0.010);
        assert_eq!(breakdown.isr.amount, 12.07);
        assert_eq!(breakdown.net_before_conversion, 1291.38);
        assert_eq!(breakdown.net_payout_currency, 1291.38);
        assert_eq!(breakdown.payout_fee.amount, 0.0);
        assert_eq!(breakdown.final_amount, 1291.38);
        assert_eq!(breakdown.rates_used, rates);
    }

    #[test]
    fn breakdown_without_vat_keeps_zeroed_fields() {
        let mut instructor = mx_resico(0.0, "USD");
        instructor.country_code = "US".to_string();
        instructor.regime_code = "w9".to_string();
        instructor.payout_method = PaymentMethod::Paypal;

        let rates = test_rates();
        let breakdown = calculate_instructor_payout(PayoutParams {
            sale_amount_usd: 100.0,
            platform_commission_rate: 0.30,
            instructor: &instructor,
            rates: &rates,
        });

        assert_eq!(breakdown.sale_amount_tax_currency, 100.0);
        assert_eq!(breakdown.subtotal_after_commission, 70.0);
        assert_eq!(breakdown.vat_exclusive_subtotal, 70.0);
        assert_eq!(breakdown.vat, VatBreakdown::default());
        assert_eq!(breakdown.isr, IsrWithholding::default());
        assert_eq!(breakdown.net_before_conversion, 70.0);
        // PayPal payout: 70 * 2.9% + 0.30 = 2.33
        assert_eq!(breakdown.payout_fee.amount, 2.33);
        assert_eq!(breakdown.final_amount, 67.67);
    }

    #[test]
    fn ceiling_alerts_escalate_then_block() {
        let ok = validate_tax_limits(&mx_resico(1_000_000.0, "MXN"), 100_000.0);
        assert!(ok.can_continue);
        assert!(ok.alerts.is_empty());

        let warning = validate_tax_limits(&mx_resico(2_500_000.0, "MXN"), 300_000.0);
        assert!(warning.can_continue);
        assert_eq!(warning.percentage, 80.0);
        assert_eq!(warning.alerts.len(), 1);
        assert_eq!(warning.alerts[0].level, TaxAlertLevel::Warning);

        let critical = validate_tax_limits(&mx_resico(3_150_000.0, "MXN"), 0.0);
        assert!(critical.can_continue);
        assert_eq!(critical.percentage, 90.0);
        assert_eq!(critical.alerts[0].level, TaxAlertLevel::Critical);

        let blocked = validate_tax_limits(&mx_resico(3_400_000.0, "MXN"), 100_000.0);
        assert!(!blocked.can_continue);
        assert_eq!(blocked.percentage, 100.0);
        assert_eq!(blocked.alerts[0].level, TaxAlertLevel::Critical);
    }

    #[test]
    fn regimes_without_ceiling_never_alert() {
        let mut instructor = mx_resico(10_000_000.0, "MXN");
        instructor.regime_code = "612".to_string();
        let check = validate_tax_limits(&instructor, 1_000_000.0);
        assert!(check.can_continue);
        assert_eq!(check.percentage, 0.0);
        assert!(check.alerts.is_empty());
    }
}

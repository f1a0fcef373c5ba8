use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::money::round2;

#[derive(Debug, Clone, Copy)]
pub struct IsrTier {
    pub max_accumulated_income: f64,
    pub rate: f64,
}

#[derive(Debug, Clone)]
pub enum IsrRule {
    Flat(f64),
    /// Ordered by ceiling, ascending. The first tier whose ceiling covers the
    /// accumulated income wins; income past the last ceiling keeps the last rate.
    Tiered(Vec<IsrTier>),
}

#[derive(Debug, Clone)]
pub struct FiscalRegime {
    pub name: &'static str,
    /// Fraction of VAT the platform withholds and remits on the instructor's behalf.
    pub vat_retention: f64,
    pub isr: IsrRule,
    /// Annual income cap for regimes that have one (e.g. simplified regimes).
    pub income_ceiling: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CountryConfig {
    pub code: &'static str,
    pub currency: &'static str,
    pub tax_currency: &'static str,
    pub vat_rate: f64,
    pub regimes: HashMap<&'static str, FiscalRegime>,
}

/// Generic profile for countries we have no fiscal table for. New instructors
/// land here until their fiscal profile is curated.
pub const INTL: &str = "INTL";

static COUNTRY_CONFIGS: Lazy<HashMap<&'static str, CountryConfig>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert(
        "MX",
        CountryConfig {
            code: "MX",
            currency: "MXN",
            tax_currency: "MXN",
            vat_rate: 0.16,
            regimes: HashMap::from([
                (
                    "626",
                    FiscalRegime {
                        name: "Régimen Simplificado de Confianza",
                        vat_retention: 0.5,
                        isr: IsrRule::Tiered(vec![
                            IsrTier { max_accumulated_income: 300_000.0, rate: 0.010 },
                            IsrTier { max_accumulated_income: 600_000.0, rate: 0.011 },
                            IsrTier { max_accumulated_income: 1_000_000.0, rate: 0.015 },
                            IsrTier { max_accumulated_income: 2_500_000.0, rate: 0.020 },
                            IsrTier { max_accumulated_income: 3_500_000.0, rate: 0.025 },
                        ]),
                        income_ceiling: Some(3_500_000.0),
                    },
                ),
                (
                    "612",
                    FiscalRegime {
                        name: "Actividades Empresariales y Profesionales",
                        vat_retention: 0.5,
                        isr: IsrRule::Flat(0.10),
                        income_ceiling: None,
                    },
                ),
                (
                    "601",
                    FiscalRegime {
                        name: "General de Ley Personas Morales",
                        vat_retention: 0.0,
                        isr: IsrRule::Flat(0.0),
                        income_ceiling: None,
                    },
                ),
            ]),
        },
    );

    map.insert(
        "CO",
        CountryConfig {
            code: "CO",
            currency: "COP",
            tax_currency: "COP",
            vat_rate: 0.19,
            regimes: HashMap::from([
                (
                    "48",
                    FiscalRegime {
                        name: "Responsable de IVA",
                        vat_retention: 0.15,
                        isr: IsrRule::Flat(0.11),
                        income_ceiling: None,
                    },
                ),
                (
                    "49",
                    FiscalRegime {
                        name: "Régimen Simple de Tributación",
                        vat_retention: 0.0,
                        isr: IsrRule::Flat(0.035),
                        income_ceiling: None,
                    },
                ),
            ]),
        },
    );

    map.insert(
        "ES",
        CountryConfig {
            code: "ES",
            currency: "EUR",
            tax_currency: "EUR",
            vat_rate: 0.21,
            regimes: HashMap::from([(
                "autonomo",
                FiscalRegime {
                    name: "Trabajador Autónomo",
                    vat_retention: 0.0,
                    isr: IsrRule::Flat(0.15),
                    income_ceiling: None,
                },
            )]),
        },
    );

    map.insert(
        "US",
        CountryConfig {
            code: "US",
            currency: "USD",
            tax_currency: "USD",
            vat_rate: 0.0,
            regimes: HashMap::from([(
                "w9",
                FiscalRegime {
                    name: "US Person (W-9 on file)",
                    vat_retention: 0.0,
                    isr: IsrRule::Flat(0.0),
                    income_ceiling: None,
                },
            )]),
        },
    );

    map.insert(
        INTL,
        CountryConfig {
            code: INTL,
            currency: "USD",
            tax_currency: "USD",
            vat_rate: 0.0,
            regimes: HashMap::new(),
        },
    );

    map
});

/// Lookup is total: unknown countries resolve to the `INTL` profile.
pub fn country_config(country_code: &str) -> &'static CountryConfig {
    COUNTRY_CONFIGS
        .get(country_code)
        .unwrap_or_else(|| &COUNTRY_CONFIGS[INTL])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IsrWithholding {
    pub rate: f64,
    pub amount: f64,
}

/// Income-tax withholding for one sale.
///
/// The bracket is picked from the income accumulated BEFORE this sale, and
/// the bracket's rate applies to the whole sale amount. This is deliberately
/// not marginal taxation; payout history was settled this way.
pub fn calculate_isr(
    country_code: &str,
    regime_code: &str,
    accumulated_income: f64,
    sale_amount: f64,
) -> IsrWithholding {
    let config = country_config(country_code);
    let Some(regime) = config.regimes.get(regime_code) else {
        tracing::warn!(
            "[fiscal::calculate_isr] unknown regime {} for {}, withholding nothing",
            regime_code,
            config.code
        );
        return IsrWithholding::default();
    };

    let rate = match &regime.isr {
        IsrRule::Flat(rate) => *rate,
        IsrRule::Tiered(tiers) => tiers
            .iter()
            .find(|tier| accumulated_income <= tier.max_accumulated_income)
            .or(tiers.last())
            .map(|tier| tier.rate)
            .unwrap_or(0.0),
    };

    IsrWithholding { rate, amount: round2(sale_amount * rate) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VatBreakdown {
    pub vat: f64,
    pub vat_retained: f64,
    pub vat_passed_through: f64,
}

/// VAT on `net_amount`, split into the retained part and the part passed
/// through to the instructor.
pub fn calculate_vat(country_code: &str, regime_code: &str, net_amount: f64) -> VatBreakdown {
    let config = country_config(country_code);
    let retention = match config.regimes.get(regime_code) {
        Some(regime) => regime.vat_retention,
        None => {
            tracing::warn!(
                "[fiscal::calculate_vat] unknown regime {} for {}, retaining nothing",
                regime_code,
                config.code
            );
            0.0
        }
    };

    let vat = round2(net_amount * config.vat_rate);
    let vat_retained = round2(vat * retention);
    VatBreakdown {
        vat,
        vat_retained,
        vat_passed_through: round2(vat - vat_retained),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_country_falls_back_to_intl() {
        let config = country_config("ZZ");
        assert_eq!(config.code, INTL);
        assert_eq!(config.vat_rate, 0.0);
    }

    #[test]
    fn unknown_regime_degrades_to_zero() {
        let isr = calculate_isr("MX", "999", 100_000.0, 1000.0);
        assert_eq!(isr, IsrWithholding::default());

        let vat = calculate_vat("MX", "999", 1000.0);
        assert_eq!(vat.vat, 160.0);
        assert_eq!(vat.vat_retained, 0.0);
        assert_eq!(vat.vat_passed_through, 160.0);
    }

    #[test]
    fn tier_is_picked_from_pre_sale_income() {
        // Just under the first ceiling: the whole sale keeps the 1.0% rate,
        // even though the sale itself crosses into the next bracket.
        let isr = calculate_isr("MX", "626", 299_999.0, 10_000.0);
        assert_eq!(isr.rate, 0.010);
        assert_eq!(isr.amount, 100.0);

        let isr = calculate_isr("MX", "626", 300_001.0, 10_000.0);
        assert_eq!(isr.rate, 0.011);
    }

    #[test]
    fn income_past_last_ceiling_keeps_last_rate() {
        let isr = calculate_isr("MX", "626", 9_000_000.0, 1000.0);
        assert_eq!(isr.rate, 0.025);
        assert_eq!(isr.amount, 25.0);
    }

    #[test]
    fn tiered_rate_is_monotonic_in_accumulated_income() {
        let incomes = [
            0.0, 150_000.0, 300_000.0, 300_001.0, 600_000.0, 999_999.0, 1_000_001.0,
            2_500_000.0, 3_499_999.0, 3_500_001.0, 9_000_000.0,
        ];
        let mut last_rate = 0.0;
        for accumulated in incomes {
            let isr = calculate_isr("MX", "626", accumulated, 1000.0);
            assert!(
                isr.rate >= last_rate,
                "rate regressed at accumulated={accumulated}: {} < {last_rate}",
                isr.rate
            );
            last_rate = isr.rate;
        }
    }

    #[test]
    fn vat_retention_split() {
        let vat = calculate_vat("MX", "626", 1206.90);
        assert_eq!(vat.vat, 193.10);
        assert_eq!(vat.vat_retained, 96.55);
        assert_eq!(vat.vat_passed_through, 96.55);
    }

    #[test]
    fn flat_isr_regime() {
        let isr = calculate_isr("ES", "autonomo", 50_000.0, 200.0);
        assert_eq!(isr.rate, 0.15);
        assert_eq!(isr.amount, 30.0);
    }
}

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;

use aula_settlement::ExchangeRates;

const DEFAULT_API_URL: &str = "https://open.er-api.com/v6/latest/USD";
const CACHE_TTL_MINUTES: i64 = 60;

/// Last-known-good snapshot, used whenever the live API is unreachable.
/// Payout math must keep going through a rates outage.
static FALLBACK_USD_RATES: Lazy<ExchangeRates> = Lazy::new(|| {
    ExchangeRates::from([
        ("USD".to_string(), 1.0),
        ("MXN".to_string(), 18.50),
        ("COP".to_string(), 4_100.0),
        ("EUR".to_string(), 0.92),
        ("GBP".to_string(), 0.79),
        ("ARS".to_string(), 1_350.0),
        ("BRL".to_string(), 5.40),
    ])
});

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: ExchangeRates,
}

pub struct ExchangeRateClient {
    http: reqwest::Client,
    api_url: String,
    cache: Mutex<Option<(DateTime<Utc>, ExchangeRates)>>,
}

impl ExchangeRateClient {
    pub fn new() -> Self {
        let api_url = std::env::var("EXCHANGE_RATE_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self { http: reqwest::Client::new(), api_url, cache: Mutex::new(None) }
    }

    /// USD-base rates table. Never fails: serves the cache while fresh, and
    /// degrades to the static table when the API is down.
    pub async fn usd_rates(&self) -> ExchangeRates {
        if let Some((fetched_at, rates)) = self.cache.lock().unwrap().clone() {
            if Utc::now() - fetched_at < Duration::minutes(CACHE_TTL_MINUTES) {
                return rates;
            }
        }

        match self.fetch().await {
            Ok(rates) => {
                *self.cache.lock().unwrap() = Some((Utc::now(), rates.clone()));
                rates
            }
            Err(err) => {
                tracing::warn!(
                    "[ExchangeRateClient::usd_rates] live rates unavailable, using fallback table: {err:#}"
                );
                FALLBACK_USD_RATES.clone()
            }
        }
    }

    async fn fetch(&self) -> Result<ExchangeRates> {
        let response = self.http.get(&self.api_url).send().await?.error_for_status()?;
        let parsed: RatesResponse = response.json().await?;
        if parsed.rates.is_empty() {
            return Err(anyhow!("empty rates table from {}", self.api_url));
        }
        Ok(parsed.rates)
    }

    pub fn fallback_rates() -> ExchangeRates {
        FALLBACK_USD_RATES.clone()
    }
}

impl Default for ExchangeRateClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_table_is_usd_based() {
        let rates = ExchangeRateClient::fallback_rates();
        assert_eq!(rates.get("USD"), Some(&1.0));
        assert!(rates.contains_key("MXN"));
    }

    #[tokio::test]
    async fn unreachable_api_degrades_to_fallback() {
        let client = ExchangeRateClient {
            http: reqwest::Client::new(),
            api_url: "http://127.0.0.1:9/latest/USD".to_string(),
            cache: Mutex::new(None),
        };
        let rates = client.usd_rates().await;
        assert_eq!(rates, ExchangeRateClient::fallback_rates());
    }
}

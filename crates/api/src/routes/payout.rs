use anyhow::anyhow;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Uuid;

use aula_settlement::store::SettlementStore;
use aula_settlement::{
    calculate_instructor_payout, validate_tax_limits, PayoutParams, PLATFORM_COMMISSION_RATE,
};

use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn payout_routes() -> Router<GlobalState> {
    Router::new().route("/payouts/preview", post(preview_payout))
}

#[derive(Debug, Deserialize)]
struct PreviewPayoutBody {
    instructor_user_id: Uuid,
    sale_amount_usd: f64,
    #[serde(default)]
    commission_rate: Option<f64>,
}

async fn preview_payout(
    State(state): State<GlobalState>,
    Json(body): Json<PreviewPayoutBody>,
) -> Result<AppSuccess, AppError> {
    let profile = state
        .store
        .instructor_fiscal_profile(body.instructor_user_id)
        .await?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                anyhow!("[preview_payout] instructor fiscal profile not found"),
            )
        })?;

    let payment_config = state.store.instructor_payment_config(profile.user_id).await?;
    let payouts_enabled =
        payment_config.as_ref().is_some_and(|config| config.can_receive_payouts());

    let rates = state.rates.usd_rates().await;
    let breakdown = calculate_instructor_payout(PayoutParams {
        sale_amount_usd: body.sale_amount_usd,
        platform_commission_rate: body.commission_rate.unwrap_or(PLATFORM_COMMISSION_RATE),
        instructor: &profile,
        rates: &rates,
    });
    let tax_limits = validate_tax_limits(&profile, breakdown.vat_exclusive_subtotal);

    Ok(AppSuccess::new(
        StatusCode::OK,
        "Payout preview",
        json!({
            "payouts_enabled": payouts_enabled,
            "breakdown": breakdown,
            "tax_limits": tax_limits,
        }),
    ))
}

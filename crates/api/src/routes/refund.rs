use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Uuid;

use aula_settlement::{
    ProductKind, ProductRef, RefundError, RefundRequestOutcome, RefundReviewOutcome,
    ReviewDecision,
};

use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

pub fn refund_routes() -> Router<GlobalState> {
    Router::new()
        .route("/refunds", post(request_refund))
        .route("/refunds/{refund_id}/review", post(review_refund))
}

#[derive(Debug, Deserialize)]
struct RequestRefundBody {
    user_id: Uuid,
    sale_id: Uuid,
    product_id: Uuid,
    product_type: ProductKind,
    reason: String,
}

async fn request_refund(
    State(state): State<GlobalState>,
    Json(body): Json<RequestRefundBody>,
) -> Result<AppSuccess, AppError> {
    let product = ProductRef { product_type: body.product_type, product_id: body.product_id };
    let outcome = state
        .refunds
        .request_refund(body.user_id, body.sale_id, product, body.reason)
        .await
        .map_err(refund_error)?;

    // Precondition failures are soft notices with a stable reason code, not
    // error responses; the frontend renders them inline.
    Ok(match outcome {
        RefundRequestOutcome::Accepted(refund) => AppSuccess::new(
            StatusCode::CREATED,
            "Refund request received",
            json!({ "refund": refund }),
        ),
        RefundRequestOutcome::Rejected(rejection) => AppSuccess::new(
            StatusCode::OK,
            "Refund request rejected",
            json!({ "rejection": rejection }),
        ),
    })
}

#[derive(Debug, Deserialize)]
struct ReviewRefundBody {
    decision: ReviewDecision,
    reviewer_id: Uuid,
}

async fn review_refund(
    State(state): State<GlobalState>,
    Path(refund_id): Path<Uuid>,
    Json(body): Json<ReviewRefundBody>,
) -> Result<AppSuccess, AppError> {
    let outcome = state
        .refunds
        .review_refund(refund_id, body.decision, body.reviewer_id)
        .await
        .map_err(refund_error)?;

    Ok(match outcome {
        RefundReviewOutcome::Completed(refund) => AppSuccess::new(
            StatusCode::OK,
            "Refund approved and completed",
            json!({ "refund": refund }),
        ),
        RefundReviewOutcome::Rejected(refund) => {
            AppSuccess::new(StatusCode::OK, "Refund rejected", json!({ "refund": refund }))
        }
        RefundReviewOutcome::Blocked(rejection) => AppSuccess::new(
            StatusCode::OK,
            "Refund approval blocked",
            json!({ "rejection": rejection }),
        ),
    })
}

fn refund_error(err: RefundError) -> AppError {
    let status = match &err {
        RefundError::NotFound(_) => StatusCode::NOT_FOUND,
        RefundError::AlreadyReviewed(_, _) => StatusCode::CONFLICT,
        RefundError::WalletCredit(_) | RefundError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    AppError::new(status, err.into())
}

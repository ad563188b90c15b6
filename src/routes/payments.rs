use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        CreatePaymentIntentRequest, PaymentIntent, PaymentVerification, RefundRequest,
        VerifyPaymentRequest,
    },
    entity::payments::PaymentStatus,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/verify", post(verify_payment))
        .route("/{id}/refund", post(refund_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/intent",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Gateway order opened for the order total", body = ApiResponse<PaymentIntent>),
        (status = 409, description = "Order already paid or no longer pending"),
        (status = 502, description = "Payment gateway unavailable"),
    ),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> AppResult<Json<ApiResponse<PaymentIntent>>> {
    let intent = state.payments.create_intent(payload.order_id).await?;
    Ok(Json(ApiResponse::success(
        "Payment intent created",
        intent,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment captured, order confirmed", body = ApiResponse<PaymentVerification>),
        (status = 402, description = "Payment failed, order cancelled", body = ApiResponse<PaymentVerification>),
        (status = 404, description = "No payment for that gateway order"),
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PaymentVerification>>)> {
    let outcome = state.payments.verify(payload).await?;
    let (status, message) = match outcome.payment.status {
        PaymentStatus::Failed => (StatusCode::PAYMENT_REQUIRED, "Payment failed"),
        PaymentStatus::Refunded => (StatusCode::OK, "Payment refunded"),
        _ => (StatusCode::OK, "Payment verified"),
    };
    Ok((
        status,
        Json(ApiResponse::success(message, outcome, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Payment refunded, order marked refunded", body = ApiResponse<PaymentVerification>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Payment is not completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<PaymentVerification>>> {
    ensure_admin(&user)?;
    let outcome = state
        .payments
        .refund(id, payload.reason, Some(user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(
        "Payment refunded",
        outcome,
        Some(Meta::empty()),
    )))
}

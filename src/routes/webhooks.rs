use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};

use crate::{
    dto::shipments::{TrackingUpdate, TrackingUpdateResult},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

pub fn router() -> Router<AppState> {
    Router::new().route("/tracking", post(tracking_webhook))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/tracking",
    request_body = TrackingUpdate,
    params(("x-webhook-token" = Option<String>, Header, description = "Shared courier token")),
    responses(
        (status = 200, description = "Scan applied", body = ApiResponse<TrackingUpdateResult>),
        (status = 401, description = "Missing or wrong webhook token"),
        (status = 404, description = "Unknown waybill"),
    ),
    tag = "Webhooks"
)]
pub async fn tracking_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TrackingUpdate>,
) -> AppResult<Json<ApiResponse<TrackingUpdateResult>>> {
    if let Some(expected) = state.courier_webhook_token.as_deref() {
        let presented = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected) {
            tracing::warn!(tracking_number = %payload.tracking_number, "webhook token rejected");
            return Err(AppError::Unauthorized("Invalid webhook token".into()));
        }
    }

    let result = state.shipments.apply_tracking_update(payload).await?;
    Ok(Json(ApiResponse::success(
        "Tracking updated",
        result,
        Some(Meta::empty()),
    )))
}

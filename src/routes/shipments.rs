use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::shipments::TrackingUpdateResult,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Shipping,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}", post(create_shipment))
        .route("/{tracking_number}/refresh", post(refresh_tracking))
}

#[utoipa::path(
    post,
    path = "/api/shipments/orders/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Shipment created or already present", body = ApiResponse<Shipping>),
        (status = 400, description = "Order has no completed payment"),
        (status = 422, description = "Courier does not serve the destination"),
        (status = 502, description = "Courier unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Shipping>>> {
    ensure_admin(&user)?;
    let shipping = state.shipments.create_for_order(order_id).await?;
    Ok(Json(ApiResponse::success(
        "Shipment ready",
        shipping.into(),
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/shipments/{tracking_number}/refresh",
    params(("tracking_number" = String, Path, description = "Courier waybill")),
    responses(
        (status = 200, description = "Latest courier scan applied", body = ApiResponse<TrackingUpdateResult>),
        (status = 404, description = "Unknown waybill"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipments"
)]
pub async fn refresh_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<ApiResponse<TrackingUpdateResult>>> {
    ensure_admin(&user)?;
    let result = state.shipments.refresh_tracking(&tracking_number).await?;
    Ok(Json(ApiResponse::success(
        "Tracking refreshed",
        result,
        Some(Meta::empty()),
    )))
}

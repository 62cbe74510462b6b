use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    dto::webhooks::OrderWebhookPayload,
    error::AppResult,
    response::ApiResponse,
    services::{order_status::ProjectionOutcome, webhook_service},
    state::AppState,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router<AppState> {
    Router::new().route("/order-status", post(order_status_webhook))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/order-status",
    request_body = OrderWebhookPayload,
    params(
        ("x-webhook-secret" = Option<String>, Header, description = "Shared secret, required when configured")
    ),
    responses(
        (status = 200, description = "Status change projected", body = ApiResponse<ProjectionOutcome>),
        (status = 400, description = "Malformed event"),
        (status = 401, description = "Invalid webhook secret"),
        (status = 502, description = "Notification delivery failed"),
    ),
    tag = "Webhooks"
)]
pub async fn order_status_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<OrderWebhookPayload>,
) -> AppResult<Json<ApiResponse<ProjectionOutcome>>> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    let response = webhook_service::handle_order_webhook(&state, secret, payload).await?;
    Ok(Json(response))
}

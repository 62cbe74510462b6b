use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutPayload, CheckoutReadiness, CheckoutResult, OrderList, ReadinessQuery},
    error::AppResult,
    middleware::auth::CurrentUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn route() -> Router<AppState> {
    Router::new()
        .route("/", get(list_order))
        .route("/{id}", get(get_order))
}

pub fn checkout_router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/readiness", get(checkout_readiness))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "asc or desc, default desc")
    ),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let response = order_service::get_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutPayload,
    responses(
        (status = 200, description = "Order created from the aggregated cart", body = ApiResponse<CheckoutResult>),
        (status = 409, description = "A submission is already in flight"),
        (status = 422, description = "Cart or delivery details not ready"),
        (status = 503, description = "Order could not be recorded"),
        (status = 504, description = "Order submission timed out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<Json<ApiResponse<CheckoutResult>>> {
    let response = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/checkout/readiness",
    params(
        ("latitude" = Option<f64>, Query, description = "Delivery latitude"),
        ("longitude" = Option<f64>, Query, description = "Delivery longitude")
    ),
    responses(
        (status = 200, description = "Whether the order can be submitted", body = ApiResponse<CheckoutReadiness>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout_readiness(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ReadinessQuery>,
) -> AppResult<Json<ApiResponse<CheckoutReadiness>>> {
    let response = order_service::checkout_readiness(&state, &user, query).await?;
    Ok(Json(response))
}

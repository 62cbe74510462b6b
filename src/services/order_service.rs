use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutPayload, CheckoutReadiness, CheckoutResult, OrderList, ReadinessQuery},
    error::{AppError, AppResult},
    middleware::auth::CurrentUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        aggregator::load_aggregated_cart,
        checkout::{CheckoutRequest, submit_order, submit_readiness},
        notices::NoticeBuffer,
    },
    state::AppState,
};

pub async fn checkout(
    state: &AppState,
    user: &CurrentUser,
    payload: CheckoutPayload,
) -> AppResult<ApiResponse<CheckoutResult>> {
    let notices = NoticeBuffer::new();
    let request = CheckoutRequest {
        location: payload.location,
        notes: payload.notes,
    };
    let receipt = submit_order(state, user, request, &notices).await?;

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResult {
            receipt,
            notices: notices.take(),
        },
        Some(Meta::empty()),
    ))
}

/// Evaluates the submit guards without touching the order store.
pub async fn checkout_readiness(
    state: &AppState,
    user: &CurrentUser,
    query: ReadinessQuery,
) -> AppResult<ApiResponse<CheckoutReadiness>> {
    let notices = NoticeBuffer::new();
    let cart = load_aggregated_cart(state, user.user_id, &notices).await;
    let submitting = state.submissions.is_submitting(user.user_id);

    let blocked_by = submit_readiness(&cart, query.location()).err();
    let readiness = CheckoutReadiness {
        can_submit: blocked_by.is_none() && !submitting,
        submitting,
        message: blocked_by.as_ref().map(ToString::to_string),
        blocked_by,
        total: cart.total,
    };
    Ok(ApiResponse::success("OK", readiness, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    user: &CurrentUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (filter, page, limit) = query.to_filter();
    let result = state.orders.orders_for_user(user.user_id, filter).await?;
    let meta = Meta::new(page, limit, result.total as i64);
    Ok(ApiResponse::success(
        "Ok",
        OrderList {
            items: result.items,
        },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = state
        .orders
        .order_for_user(user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, StatusUpdateResult, UpdateOrderStatusRequest},
    error::AppResult,
    middleware::auth::{CurrentUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_status::{
        OrderStatusChange, ProjectionOutcome, notification_for, project_status_change,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &CurrentUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (filter, page, limit) = query.to_filter();
    let result = state.orders.all_orders(filter).await?;
    let meta = Meta::new(page, limit, result.total as i64);
    Ok(ApiResponse::success(
        "Orders",
        OrderList {
            items: result.items,
        },
        Some(meta),
    ))
}

/// Any status may follow any other; only the notification rules look at the pair.
pub async fn update_order_status(
    state: &AppState,
    user: &CurrentUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<StatusUpdateResult>> {
    ensure_admin(user)?;

    let change = state.orders.update_status(id, payload.status).await?;
    let order = change.order;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "old_status": change.old_status,
            "status": order.status,
        })),
    )
    .await;

    let projection = project_status_change(
        state.ledger.as_ref(),
        state.mailer.as_ref(),
        OrderStatusChange {
            order_id: order.id,
            old_status: change.old_status,
            new_status: order.status,
        },
    )
    .await;

    // Status is committed at this point; notification failures only warn.
    let notification = match projection {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.id, "order notification failed");
            notification_for(change.old_status, order.status)
                .map_or(ProjectionOutcome::Skipped, ProjectionOutcome::Failed)
        }
    };

    Ok(ApiResponse::success(
        "Order updated",
        StatusUpdateResult {
            previous_status: change.old_status,
            order,
            notification,
        },
        Some(Meta::empty()),
    ))
}

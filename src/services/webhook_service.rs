use crate::{
    dto::webhooks::OrderWebhookPayload,
    error::{AppError, AppResult},
    models::OrderStatus,
    response::ApiResponse,
    services::order_status::{OrderStatusChange, ProjectionOutcome, project_status_change},
    state::AppState,
};

fn parse_status(label: &str) -> AppResult<OrderStatus> {
    label
        .parse::<OrderStatus>()
        .map_err(|err| AppError::BadRequest(err.to_string()))
}

/// Handles a row-update event from the database webhook.
pub async fn handle_order_webhook(
    state: &AppState,
    secret: Option<&str>,
    payload: OrderWebhookPayload,
) -> AppResult<ApiResponse<ProjectionOutcome>> {
    if let Some(expected) = state.config.webhook_secret.as_deref() {
        if secret != Some(expected) {
            return Err(AppError::Unauthorized("Invalid webhook secret".into()));
        }
    }

    if payload.event_type != "UPDATE" {
        return Ok(ApiResponse::success("Ignored", ProjectionOutcome::Skipped, None));
    }
    if let Some(table) = payload.table.as_deref().filter(|t| *t != "orders") {
        return Err(AppError::BadRequest(format!("unexpected table `{table}`")));
    }
    let Some(old_record) = payload.old_record else {
        return Err(AppError::BadRequest("old_record is required for UPDATE events".into()));
    };

    let change = OrderStatusChange {
        order_id: payload.record.id,
        old_status: parse_status(&old_record.status)?,
        new_status: parse_status(&payload.record.status)?,
    };
    let outcome =
        project_status_change(state.ledger.as_ref(), state.mailer.as_ref(), change).await?;

    Ok(ApiResponse::success("Processed", outcome, None))
}

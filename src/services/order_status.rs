//! Maps order status changes to customer notifications.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{NotificationKind, OrderStatus},
    services::mailer::MailDispatcher,
    stores::NotificationLedger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatusChange {
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

/// First matching rule wins; any other pair, including an unchanged status, sends nothing.
pub fn notification_for(old: OrderStatus, new: OrderStatus) -> Option<NotificationKind> {
    match (old, new) {
        (OrderStatus::Pending, OrderStatus::Validated) => Some(NotificationKind::Validation),
        (old, OrderStatus::Delivered) if old != OrderStatus::Delivered => Some(NotificationKind::Delivery),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", content = "kind", rename_all = "snake_case")]
pub enum ProjectionOutcome {
    /// No notification is due for this transition.
    Skipped,
    Duplicate(NotificationKind),
    Sent(NotificationKind),
    /// A notification was due but could not be dispatched; the claim was released.
    Failed(NotificationKind),
}

/// Sends at most one notification per `(order, kind)`.
///
/// The key is claimed before dispatch and released again if dispatch fails, so a redelivered event
/// can retry but a successful send is never repeated.
#[tracing::instrument(skip(ledger, mailer), fields(order_id = %change.order_id))]
pub async fn project_status_change(
    ledger: &dyn NotificationLedger,
    mailer: &dyn MailDispatcher,
    change: OrderStatusChange,
) -> AppResult<ProjectionOutcome> {
    let Some(kind) = notification_for(change.old_status, change.new_status) else {
        tracing::debug!(old = %change.old_status, new = %change.new_status, "no notification for transition");
        return Ok(ProjectionOutcome::Skipped);
    };

    if !ledger.claim(change.order_id, kind).await? {
        tracing::info!(kind = kind.as_str(), "notification already sent, skipping duplicate");
        return Ok(ProjectionOutcome::Duplicate(kind));
    }

    if let Err(err) = mailer.send_notification(change.order_id, kind).await {
        if let Err(release_err) = ledger.release(change.order_id, kind).await {
            tracing::warn!(error = %release_err, "could not release notification claim");
        }
        return Err(err.into());
    }

    Ok(ProjectionOutcome::Sent(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn only_validation_and_delivery_transitions_notify() {
        assert_eq!(notification_for(Pending, Validated), Some(NotificationKind::Validation));
        assert_eq!(notification_for(Validated, Pending), None);
        assert_eq!(notification_for(Pending, Delivered), Some(NotificationKind::Delivery));
        assert_eq!(notification_for(Delivered, Delivered), None);
    }

    #[test]
    fn every_status_except_delivered_notifies_on_delivery() {
        for old in OrderStatus::ALL {
            let expected = (old != Delivered).then_some(NotificationKind::Delivery);
            assert_eq!(notification_for(old, Delivered), expected, "from {old}");
        }
    }

    #[test]
    fn unchanged_status_never_notifies() {
        for status in OrderStatus::ALL {
            assert_eq!(notification_for(status, status), None);
        }
    }
}

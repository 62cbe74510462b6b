//! Checkout flow: guarded transitions from cart review to a confirmed order, followed by best-effort
//! clearing of every source cart.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    error::{AppError, AppResult},
    middleware::auth::CurrentUser,
    models::{CartLineItem, DeliveryLocation, Order, SnapshotLine, SourceType},
    services::{
        aggregator::{AggregatedCart, load_aggregated_cart},
        cart_sources::SourceCartRef,
        notices::{Notice, Notifier},
    },
    state::AppState,
    stores::NewOrder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutState {
    Browsing,
    ReviewingCart,
    FillingOrderForm,
    Submitting,
    OrderConfirmed { order_id: Uuid },
}

impl CheckoutState {
    fn name(&self) -> &'static str {
        match self {
            CheckoutState::Browsing => "browsing",
            CheckoutState::ReviewingCart => "reviewing_cart",
            CheckoutState::FillingOrderForm => "filling_order_form",
            CheckoutState::Submitting => "submitting",
            CheckoutState::OrderConfirmed { .. } => "order_confirmed",
        }
    }
}

/// Why an order cannot be submitted yet. Shown to the user next to the disabled submit action.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CheckoutGuard {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("A delivery location is required")]
    MissingLocation,

    #[error("The delivery location is not a valid coordinate")]
    InvalidLocation,

    #[error("Part of your cart could not be loaded, please retry")]
    IncompleteCart { failed_sources: Vec<SourceType> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Guard(#[from] CheckoutGuard),

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

/// Client-side checkout flow for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutFlow {
    state: CheckoutState,
}

impl Default for CheckoutFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutFlow {
    pub fn new() -> Self {
        Self {
            state: CheckoutState::Browsing,
        }
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }

    pub fn open_cart(&mut self) -> Result<(), CheckoutError> {
        match self.state {
            CheckoutState::Browsing | CheckoutState::ReviewingCart => {
                self.state = CheckoutState::ReviewingCart;
                Ok(())
            }
            _ => Err(self.invalid("open the cart")),
        }
    }

    pub fn proceed_to_form(&mut self, cart: &AggregatedCart) -> Result<(), CheckoutError> {
        if self.state != CheckoutState::ReviewingCart {
            return Err(self.invalid("open the order form"));
        }
        if cart.is_empty() {
            return Err(CheckoutGuard::EmptyCart.into());
        }
        self.state = CheckoutState::FillingOrderForm;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CheckoutError> {
        match self.state {
            CheckoutState::FillingOrderForm | CheckoutState::ReviewingCart => {
                self.state = CheckoutState::ReviewingCart;
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    /// Enters `Submitting` and returns the frozen line snapshot for the order payload.
    pub fn begin_submit(
        &mut self,
        cart: &AggregatedCart,
        location: Option<DeliveryLocation>,
    ) -> Result<Vec<SnapshotLine>, CheckoutError> {
        if self.state != CheckoutState::FillingOrderForm {
            return Err(self.invalid("submit"));
        }
        submit_readiness(cart, location)?;
        self.state = CheckoutState::Submitting;
        Ok(cart.line_items.iter().map(|l| l.snapshot()).collect())
    }

    pub fn confirm(&mut self, order_id: Uuid) -> Result<(), CheckoutError> {
        if self.state != CheckoutState::Submitting {
            return Err(self.invalid("confirm an order"));
        }
        self.state = CheckoutState::OrderConfirmed { order_id };
        Ok(())
    }

    /// Submission failed; the user is back on the form and can retry.
    pub fn fail(&mut self) -> Result<(), CheckoutError> {
        if self.state != CheckoutState::Submitting {
            return Err(self.invalid("fail a submission"));
        }
        self.state = CheckoutState::FillingOrderForm;
        Ok(())
    }
}

/// Guards of the `FillingOrderForm -> Submitting` transition.
pub fn submit_readiness(
    cart: &AggregatedCart,
    location: Option<DeliveryLocation>,
) -> Result<DeliveryLocation, CheckoutGuard> {
    if !cart.is_complete() {
        return Err(CheckoutGuard::IncompleteCart {
            failed_sources: cart.failed_sources.clone(),
        });
    }
    if cart.is_empty() {
        return Err(CheckoutGuard::EmptyCart);
    }
    let location = location.ok_or(CheckoutGuard::MissingLocation)?;
    if !location.is_valid() {
        return Err(CheckoutGuard::InvalidLocation);
    }
    Ok(location)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClearOutcome {
    pub source: SourceCartRef,
    pub cleared: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub housekeeping: Vec<ClearOutcome>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub location: Option<DeliveryLocation>,
    pub notes: Option<String>,
}

/// Clears what the order consumed from each source cart. Failures are logged and reported, never raised.
///
/// Only lines present in `ordered` are removed. A recipe cart or bundle selection whose lines no longer
/// match the order is left in place.
pub async fn clear_sources(
    state: &AppState,
    user_id: Uuid,
    cart: &AggregatedCart,
    ordered: &[SnapshotLine],
) -> Vec<ClearOutcome> {
    let mut outcomes = Vec::with_capacity(cart.source_carts.len());
    for source in &cart.source_carts {
        let lines: Vec<&CartLineItem> = cart
            .line_items
            .iter()
            .filter(|l| l.source_type == source.source_type && l.source_cart_id == source.cart_id)
            .collect();
        let consumed: Vec<Uuid> = lines
            .iter()
            .filter(|l| ordered.contains(&l.snapshot()))
            .map(|l| l.line_item_id)
            .collect();

        let result = match source.source_type {
            SourceType::Personal if consumed.is_empty() => continue,
            SourceType::Personal => {
                state
                    .personal_carts
                    .clear_personal_items(user_id, source.cart_id, &consumed)
                    .await
            }
            _ if consumed.len() < lines.len() => {
                tracing::info!(
                    source = %source.source_type,
                    cart_id = %source.cart_id,
                    "source cart changed since the order was written, kept"
                );
                continue;
            }
            SourceType::Recipe => state.recipe_carts.clear_recipe_cart(user_id, source.cart_id).await,
            SourceType::Preconfigured => state.preconfigured.remove_selection(user_id, source.cart_id).await,
        };
        let outcome = match result {
            Ok(()) => ClearOutcome {
                source: source.clone(),
                cleared: true,
                error: None,
            },
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    source = %source.source_type,
                    cart_id = %source.cart_id,
                    "cart clearing after checkout failed"
                );
                ClearOutcome {
                    source: source.clone(),
                    cleared: false,
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

/// Looks for an order whose write outlived the submit timeout.
async fn find_late_order(state: &AppState, user_id: Uuid, order_id: Uuid) -> Option<Order> {
    let lookup = state.orders.order_for_user(user_id, order_id);
    match tokio::time::timeout(state.config.submit_timeout, lookup).await {
        Ok(Ok(found)) => found,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, %order_id, "lookup after a timed out submission failed");
            None
        }
        Err(_) => None,
    }
}

/// Submits the current cart as an order.
///
/// The cart is re-aggregated on the server, guards run before the order store is touched, and the
/// order is written once with a frozen snapshot. The order id is fixed before the write: when the write
/// times out the id is kept for the user's next attempt, so a write that lands late is picked up
/// instead of duplicated. Clearing the source carts happens afterwards and cannot undo the order.
#[tracing::instrument(skip(state, user, request, notifier), fields(user_id = %user.user_id))]
pub async fn submit_order(
    state: &AppState,
    user: &CurrentUser,
    request: CheckoutRequest,
    notifier: &dyn Notifier,
) -> AppResult<CheckoutReceipt> {
    let _permit = state.submissions.acquire(user.user_id)?;

    let cart = load_aggregated_cart(state, user.user_id, notifier).await;
    let location = submit_readiness(&cart, request.location)?;

    let mut flow = CheckoutFlow::new();
    flow.open_cart()?;
    flow.proceed_to_form(&cart)?;
    let snapshot = flow.begin_submit(&cart, Some(location))?;

    let order_id = state
        .submissions
        .unconfirmed_order(user.user_id)
        .unwrap_or_else(Uuid::new_v4);
    let new_order = NewOrder {
        id: order_id,
        user_id: user.user_id,
        line_items: snapshot,
        total_amount: cart.total,
        delivery_fee: cart.delivery_fee,
        delivery_location: location,
        delivery_notes: request.notes.filter(|n| !n.trim().is_empty()),
    };

    let created = tokio::time::timeout(state.config.submit_timeout, state.orders.create_order(new_order)).await;
    let order = match created {
        Ok(Ok(order)) => order,
        Ok(Err(err)) => {
            flow.fail()?;
            tracing::error!(error = %err, "order creation failed");
            notifier.notify(Notice::error("Your order could not be placed, please retry"));
            return Err(AppError::SubmissionFailed);
        }
        Err(_) => match find_late_order(state, user.user_id, order_id).await {
            Some(order) => {
                tracing::warn!(%order_id, "order write answered after the timeout");
                order
            }
            None => {
                state.submissions.remember_unconfirmed(user.user_id, order_id);
                flow.fail()?;
                tracing::error!(%order_id, "order creation timed out");
                notifier.notify(Notice::error("Placing your order took too long, please retry"));
                return Err(AppError::Timeout);
            }
        },
    };
    state.submissions.forget_unconfirmed(user.user_id);
    flow.confirm(order.id)?;
    tracing::info!(order_id = %order.id, total = order.total_amount, "order created");

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount })),
    )
    .await;

    let housekeeping = clear_sources(state, user.user_id, &cart, &order.line_items).await;
    notifier.notify(Notice::success("Your order has been placed"));

    Ok(CheckoutReceipt { order, housekeeping })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_with(lines: usize) -> AggregatedCart {
        let line_items = (0..lines)
            .map(|_| CartLineItem {
                owner_user_id: Uuid::nil(),
                source_type: SourceType::Personal,
                source_cart_id: Uuid::nil(),
                source_cart_label: "Personal Cart".into(),
                line_item_id: Uuid::new_v4(),
                product_ref: Some(Uuid::new_v4()),
                product_name: "Rice".into(),
                quantity: 2,
                unit_price: 150,
                unresolved: false,
            })
            .collect::<Vec<_>>();
        let subtotal = line_items.iter().map(CartLineItem::line_total).sum();
        AggregatedCart {
            owner_user_id: Uuid::nil(),
            line_items,
            source_carts: Vec::new(),
            failed_sources: Vec::new(),
            subtotal,
            delivery_fee: 0,
            total: subtotal,
        }
    }

    const DAKAR: DeliveryLocation = DeliveryLocation {
        latitude: 14.7167,
        longitude: -17.4677,
    };

    #[test]
    fn empty_cart_cannot_reach_order_form() {
        let mut flow = CheckoutFlow::new();
        flow.open_cart().unwrap();
        let err = flow.proceed_to_form(&cart_with(0)).unwrap_err();
        assert_eq!(err, CheckoutError::Guard(CheckoutGuard::EmptyCart));
        assert_eq!(flow.state(), CheckoutState::ReviewingCart);
    }

    #[test]
    fn submit_requires_location() {
        let cart = cart_with(1);
        let mut flow = CheckoutFlow::new();
        flow.open_cart().unwrap();
        flow.proceed_to_form(&cart).unwrap();
        let err = flow.begin_submit(&cart, None).unwrap_err();
        assert_eq!(err, CheckoutError::Guard(CheckoutGuard::MissingLocation));
        assert_eq!(flow.state(), CheckoutState::FillingOrderForm);
    }

    #[test]
    fn happy_path_and_retry_after_failure() {
        let cart = cart_with(2);
        let mut flow = CheckoutFlow::new();
        flow.open_cart().unwrap();
        flow.proceed_to_form(&cart).unwrap();

        let snapshot = flow.begin_submit(&cart, Some(DAKAR)).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(flow.state(), CheckoutState::Submitting);
        assert!(flow.begin_submit(&cart, Some(DAKAR)).is_err(), "double submit must be refused");

        flow.fail().unwrap();
        assert_eq!(flow.state(), CheckoutState::FillingOrderForm);

        flow.begin_submit(&cart, Some(DAKAR)).unwrap();
        let order_id = Uuid::new_v4();
        flow.confirm(order_id).unwrap();
        assert_eq!(flow.state(), CheckoutState::OrderConfirmed { order_id });
    }

    #[test]
    fn cancel_returns_to_cart_review() {
        let cart = cart_with(1);
        let mut flow = CheckoutFlow::new();
        flow.open_cart().unwrap();
        flow.proceed_to_form(&cart).unwrap();
        flow.cancel().unwrap();
        assert_eq!(flow.state(), CheckoutState::ReviewingCart);
    }

    #[test]
    fn incomplete_cart_blocks_submission() {
        let mut cart = cart_with(1);
        cart.failed_sources.push(SourceType::Recipe);
        assert_eq!(
            submit_readiness(&cart, Some(DAKAR)),
            Err(CheckoutGuard::IncompleteCart {
                failed_sources: vec![SourceType::Recipe]
            })
        );
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{DeliveryLocation, Order, OrderStatus},
    services::{
        checkout::{CheckoutGuard, CheckoutReceipt},
        notices::Notice,
        order_status::ProjectionOutcome,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutPayload {
    pub location: Option<DeliveryLocation>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResult {
    #[serde(flatten)]
    pub receipt: CheckoutReceipt,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadinessQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ReadinessQuery {
    pub fn location(&self) -> Option<DeliveryLocation> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(DeliveryLocation { latitude, longitude }),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReadiness {
    pub can_submit: bool,
    pub submitting: bool,
    pub blocked_by: Option<CheckoutGuard>,
    pub message: Option<String>,
    pub total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateResult {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub notification: ProjectionOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

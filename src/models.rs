use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Display name used when a product reference no longer resolves.
pub const UNAVAILABLE_PRODUCT: &str = "Unavailable product";

/// Label of the single personal cart section.
pub const PERSONAL_CART_LABEL: &str = "Personal Cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub unit: String,
    pub category: String,
}

/// Which cart subsystem produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Personal,
    Recipe,
    Preconfigured,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Personal => "personal",
            SourceType::Recipe => "recipe",
            SourceType::Preconfigured => "preconfigured",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the aggregated cart.
///
/// `line_total` is never stored; it is always recomputed from `quantity` and `unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub owner_user_id: Uuid,
    pub source_type: SourceType,
    pub source_cart_id: Uuid,
    pub source_cart_label: String,
    pub line_item_id: Uuid,
    pub product_ref: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub unresolved: bool,
}

impl CartLineItem {
    pub fn line_total(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price
    }

    pub fn snapshot(&self) -> SnapshotLine {
        SnapshotLine {
            product_id: self.product_ref,
            quantity: self.quantity,
            unit_price: self.unit_price,
            name: self.product_name.clone(),
        }
    }
}

/// Frozen copy of one ordered line. This is the persisted layout of `orders.line_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl DeliveryLocation {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Validated,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Validated,
        OrderStatus::Assigned,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Validated => "validated",
            OrderStatus::Assigned => "assigned",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub line_items: Vec<SnapshotLine>,
    pub total_amount: i64,
    pub delivery_fee: i64,
    pub delivery_location: DeliveryLocation,
    pub delivery_notes: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of mail sent when an order changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Validation,
    Delivery,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Validation => "validation",
            NotificationKind::Delivery => "delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItemRecord {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PersonalCart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecipeCart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    pub name: String,
    pub items: Vec<CartItemRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PreconfiguredSelection {
    pub selection_id: Uuid,
    pub preconfigured_cart_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Admin-curated bundle priced as a whole through `total_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PreconfiguredBundle {
    pub id: Uuid,
    pub name: String,
    pub total_price: i64,
    pub items: Vec<BundleItem>,
}

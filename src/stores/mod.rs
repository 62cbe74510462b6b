//! Collaborator seams used by the cart and checkout services.
//!
//! Every backend the services talk to is reached through one of these traits, so the services can run
//! against PostgreSQL in production and against [`memory::InMemoryBackend`] in tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CartItemRecord, DeliveryLocation, NotificationKind, Order, OrderStatus, PersonalCart,
    PreconfiguredBundle, PreconfiguredSelection, Product, RecipeCart, SnapshotLine,
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("invalid data: {0}")]
    Invalid(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error")]
    Db(#[from] sqlx::Error),

    #[error("ORM error")]
    Orm(#[from] sea_orm::DbErr),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Unknown ids are silently absent from the result.
    async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
}

#[async_trait]
pub trait PersonalCartStore: Send + Sync {
    async fn personal_cart(&self, user_id: Uuid) -> StoreResult<Option<PersonalCart>>;

    /// Sets the quantity of `product_id`, creating the cart and the line when missing.
    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord>;

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<()>;

    /// Deletes the listed lines of the cart; the cart row and any other line survive.
    async fn clear_personal_items(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        item_ids: &[Uuid],
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait RecipeCartStore: Send + Sync {
    /// Carts in creation order.
    async fn recipe_carts(&self, user_id: Uuid) -> StoreResult<Vec<RecipeCart>>;

    async fn create_from_recipe(&self, user_id: Uuid, recipe_id: Uuid) -> StoreResult<RecipeCart>;

    async fn set_item_quantity(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord>;

    /// Deletes the recipe cart together with its items.
    async fn clear_recipe_cart(&self, user_id: Uuid, cart_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait PreconfiguredCartStore: Send + Sync {
    /// Selections in the order they were made.
    async fn selections(&self, user_id: Uuid) -> StoreResult<Vec<PreconfiguredSelection>>;

    async fn bundles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<PreconfiguredBundle>>;

    async fn list_bundles(&self) -> StoreResult<Vec<PreconfiguredBundle>>;

    async fn select(
        &self,
        user_id: Uuid,
        preconfigured_cart_id: Uuid,
    ) -> StoreResult<PreconfiguredSelection>;

    async fn remove_selection(&self, user_id: Uuid, selection_id: Uuid) -> StoreResult<()>;
}

/// Payload of a single atomic order insert. `id` is chosen by the caller before the write.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub line_items: Vec<SnapshotLine>,
    pub total_amount: i64,
    pub delivery_fee: i64,
    pub delivery_location: DeliveryLocation,
    pub delivery_notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub oldest_first: bool,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub old_status: OrderStatus,
    pub order: Order,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Either the whole order is written or nothing is. Writing an id that already exists returns the
    /// stored order unchanged.
    async fn create_order(&self, order: NewOrder) -> StoreResult<Order>;

    async fn orders_for_user(&self, user_id: Uuid, filter: OrderFilter) -> StoreResult<OrderPage>;

    async fn order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>>;

    async fn all_orders(&self, filter: OrderFilter) -> StoreResult<OrderPage>;

    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<StatusChange>;
}

/// Remembers which `(order, kind)` notifications were already dispatched.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Returns `false` when the key was already claimed.
    async fn claim(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<bool>;

    async fn release(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub resource: Option<&'static str>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()>;
}

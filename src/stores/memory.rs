//! In-process backend with failure injection, used by tests and local demos.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    BundleItem, CartItemRecord, NotificationKind, Order, OrderStatus, PersonalCart,
    PreconfiguredBundle, PreconfiguredSelection, Product, RecipeCart,
};
use crate::services::mailer::{MailDispatcher, NotifyError};

use super::{
    AuditEntry, AuditLog, NewOrder, NotificationLedger, OrderFilter, OrderPage, OrderStore,
    PersonalCartStore, PreconfiguredCartStore, ProductCatalog, RecipeCartStore, StatusChange,
    StoreError, StoreResult,
};

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Catalog,
    PersonalRead,
    RecipeRead,
    PreconfiguredRead,
    CreateOrder,
    /// Runs after the order is stored, before the caller hears back.
    CreateOrderReply,
    ClearPersonal,
    ClearRecipe,
    RemoveSelection,
    Audit,
}

#[derive(Debug, Clone)]
struct Recipe {
    id: Uuid,
    title: String,
    ingredients: Vec<(Uuid, i32)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<Product>,
    personal_carts: Vec<PersonalCart>,
    recipes: Vec<Recipe>,
    recipe_carts: Vec<RecipeCart>,
    bundles: Vec<PreconfiguredBundle>,
    selections: Vec<(Uuid, PreconfiguredSelection)>,
    orders: Vec<Order>,
    ledger: HashSet<(Uuid, NotificationKind)>,
    audit: Vec<AuditEntry>,
    failures: HashSet<FailPoint>,
    delays: HashMap<FailPoint, Duration>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    create_order_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail(&self, point: FailPoint) {
        self.state().failures.insert(point);
    }

    /// Removes both the forced failure and the delay of `point`.
    pub fn heal(&self, point: FailPoint) {
        let mut state = self.state();
        state.failures.remove(&point);
        state.delays.remove(&point);
    }

    /// Makes every call through `point` sleep before answering.
    pub fn delay(&self, point: FailPoint, duration: Duration) {
        self.state().delays.insert(point, duration);
    }

    pub fn create_order_calls(&self) -> usize {
        self.create_order_calls.load(Ordering::SeqCst)
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state().audit.clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    pub fn add_product(&self, name: &str, price: i64) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            unit: "piece".to_string(),
            category: "grocery".to_string(),
        };
        self.state().products.push(product.clone());
        product
    }

    pub fn set_product_price(&self, product_id: Uuid, price: i64) {
        if let Some(product) = self.state().products.iter_mut().find(|p| p.id == product_id) {
            product.price = price;
        }
    }

    pub fn remove_product(&self, product_id: Uuid) {
        self.state().products.retain(|p| p.id != product_id);
    }

    pub fn add_recipe(&self, title: &str, ingredients: &[(Uuid, i32)]) -> Uuid {
        let id = Uuid::new_v4();
        self.state().recipes.push(Recipe {
            id,
            title: title.to_string(),
            ingredients: ingredients.to_vec(),
        });
        id
    }

    pub fn add_bundle(&self, name: &str, total_price: i64, items: Vec<BundleItem>) -> PreconfiguredBundle {
        let bundle = PreconfiguredBundle {
            id: Uuid::new_v4(),
            name: name.to_string(),
            total_price,
            items,
        };
        self.state().bundles.push(bundle.clone());
        bundle
    }

    pub fn remove_bundle(&self, bundle_id: Uuid) {
        self.state().bundles.retain(|b| b.id != bundle_id);
    }

    /// Checks the fail point and returns the configured delay, without holding the lock across an await.
    fn gate(&self, point: FailPoint) -> StoreResult<Option<Duration>> {
        let state = self.state();
        if state.failures.contains(&point) {
            return Err(StoreError::Unavailable(format!("{point:?} is failing")));
        }
        Ok(state.delays.get(&point).copied())
    }

    async fn enter(&self, point: FailPoint) -> StoreResult<()> {
        if let Some(duration) = self.gate(point)? {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryBackend {
    async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        self.enter(FailPoint::Catalog).await?;
        Ok(self
            .state()
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PersonalCartStore for InMemoryBackend {
    async fn personal_cart(&self, user_id: Uuid) -> StoreResult<Option<PersonalCart>> {
        self.enter(FailPoint::PersonalRead).await?;
        Ok(self
            .state()
            .personal_carts
            .iter()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord> {
        let mut state = self.state();
        let index = match state.personal_carts.iter().position(|c| c.user_id == user_id) {
            Some(index) => index,
            None => {
                state.personal_carts.push(PersonalCart {
                    id: Uuid::new_v4(),
                    user_id,
                    items: Vec::new(),
                });
                state.personal_carts.len() - 1
            }
        };
        let cart = state
            .personal_carts
            .get_mut(index)
            .ok_or(StoreError::NotFound)?;

        if let Some(item) = cart.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity;
            return Ok(item.clone());
        }
        let item = CartItemRecord {
            id: Uuid::new_v4(),
            cart_id: cart.id,
            product_id,
            quantity,
        };
        cart.items.push(item.clone());
        Ok(item)
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<()> {
        let mut state = self.state();
        let cart = state
            .personal_carts
            .iter_mut()
            .find(|c| c.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        let before = cart.items.len();
        cart.items.retain(|i| i.product_id != product_id);
        if cart.items.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_personal_items(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        item_ids: &[Uuid],
    ) -> StoreResult<()> {
        self.enter(FailPoint::ClearPersonal).await?;
        let mut state = self.state();
        let cart = state
            .personal_carts
            .iter_mut()
            .find(|c| c.id == cart_id && c.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        cart.items.retain(|i| !item_ids.contains(&i.id));
        Ok(())
    }
}

#[async_trait]
impl RecipeCartStore for InMemoryBackend {
    async fn recipe_carts(&self, user_id: Uuid) -> StoreResult<Vec<RecipeCart>> {
        self.enter(FailPoint::RecipeRead).await?;
        Ok(self
            .state()
            .recipe_carts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_from_recipe(&self, user_id: Uuid, recipe_id: Uuid) -> StoreResult<RecipeCart> {
        let mut state = self.state();
        let recipe = state
            .recipes
            .iter()
            .find(|r| r.id == recipe_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        let cart_id = Uuid::new_v4();
        let cart = RecipeCart {
            id: cart_id,
            user_id,
            recipe_id,
            name: format!("Recette: {}", recipe.title),
            items: recipe
                .ingredients
                .iter()
                .map(|(product_id, quantity)| CartItemRecord {
                    id: Uuid::new_v4(),
                    cart_id,
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
            created_at: Utc::now(),
        };
        state.recipe_carts.push(cart.clone());
        Ok(cart)
    }

    async fn set_item_quantity(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord> {
        let mut state = self.state();
        let item = state
            .recipe_carts
            .iter_mut()
            .find(|c| c.id == cart_id && c.user_id == user_id)
            .and_then(|c| c.items.iter_mut().find(|i| i.id == item_id))
            .ok_or(StoreError::NotFound)?;
        item.quantity = quantity;
        Ok(item.clone())
    }

    async fn clear_recipe_cart(&self, user_id: Uuid, cart_id: Uuid) -> StoreResult<()> {
        self.enter(FailPoint::ClearRecipe).await?;
        let mut state = self.state();
        let before = state.recipe_carts.len();
        state
            .recipe_carts
            .retain(|c| !(c.id == cart_id && c.user_id == user_id));
        if state.recipe_carts.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PreconfiguredCartStore for InMemoryBackend {
    async fn selections(&self, user_id: Uuid) -> StoreResult<Vec<PreconfiguredSelection>> {
        self.enter(FailPoint::PreconfiguredRead).await?;
        Ok(self
            .state()
            .selections
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, selection)| selection.clone())
            .collect())
    }

    async fn bundles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<PreconfiguredBundle>> {
        self.enter(FailPoint::PreconfiguredRead).await?;
        Ok(self
            .state()
            .bundles
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn list_bundles(&self) -> StoreResult<Vec<PreconfiguredBundle>> {
        Ok(self.state().bundles.clone())
    }

    async fn select(
        &self,
        user_id: Uuid,
        preconfigured_cart_id: Uuid,
    ) -> StoreResult<PreconfiguredSelection> {
        let mut state = self.state();
        if !state.bundles.iter().any(|b| b.id == preconfigured_cart_id) {
            return Err(StoreError::NotFound);
        }
        let selection = PreconfiguredSelection {
            selection_id: Uuid::new_v4(),
            preconfigured_cart_id,
        };
        state.selections.push((user_id, selection.clone()));
        Ok(selection)
    }

    async fn remove_selection(&self, user_id: Uuid, selection_id: Uuid) -> StoreResult<()> {
        self.enter(FailPoint::RemoveSelection).await?;
        let mut state = self.state();
        let before = state.selections.len();
        state
            .selections
            .retain(|(owner, s)| !(*owner == user_id && s.selection_id == selection_id));
        if state.selections.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn page(orders: Vec<Order>, filter: &OrderFilter) -> OrderPage {
    let mut items: Vec<Order> = orders
        .into_iter()
        .filter(|o| filter.status.is_none_or(|status| o.status == status))
        .collect();
    if !filter.oldest_first {
        items.reverse();
    }
    let total = items.len() as u64;
    let limit = if filter.limit == 0 { usize::MAX } else { filter.limit as usize };
    let items = items
        .into_iter()
        .skip(filter.offset as usize)
        .take(limit)
        .collect();
    OrderPage { items, total }
}

#[async_trait]
impl OrderStore for InMemoryBackend {
    async fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        self.create_order_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(FailPoint::CreateOrder).await?;
        let stored = {
            let mut state = self.state();
            match state.orders.iter().find(|o| o.id == order.id) {
                Some(existing) => existing.clone(),
                None => {
                    let now = Utc::now();
                    let created = Order {
                        id: order.id,
                        user_id: order.user_id,
                        line_items: order.line_items,
                        total_amount: order.total_amount,
                        delivery_fee: order.delivery_fee,
                        delivery_location: order.delivery_location,
                        delivery_notes: order.delivery_notes,
                        status: OrderStatus::Pending,
                        created_at: now,
                        updated_at: now,
                    };
                    state.orders.push(created.clone());
                    created
                }
            }
        };
        self.enter(FailPoint::CreateOrderReply).await?;
        Ok(stored)
    }

    async fn orders_for_user(&self, user_id: Uuid, filter: OrderFilter) -> StoreResult<OrderPage> {
        let orders = self
            .state()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(page(orders, &filter))
    }

    async fn order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self
            .state()
            .orders
            .iter()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .cloned())
    }

    async fn all_orders(&self, filter: OrderFilter) -> StoreResult<OrderPage> {
        let orders = self.state().orders.clone();
        Ok(page(orders, &filter))
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<StatusChange> {
        let mut state = self.state();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::NotFound)?;
        let old_status = order.status;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(StatusChange {
            old_status,
            order: order.clone(),
        })
    }
}

#[async_trait]
impl NotificationLedger for InMemoryBackend {
    async fn claim(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<bool> {
        Ok(self.state().ledger.insert((order_id, kind)))
    }

    async fn release(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<()> {
        self.state().ledger.remove(&(order_id, kind));
        Ok(())
    }
}

#[async_trait]
impl AuditLog for InMemoryBackend {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()> {
        self.gate(FailPoint::Audit)?;
        self.state().audit.push(entry);
        Ok(())
    }
}

/// Mail dispatcher that keeps every sent notification in memory.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Uuid, NotificationKind)>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Uuid, NotificationKind)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }
}

#[async_trait]
impl MailDispatcher for RecordingMailer {
    async fn send_notification(&self, order_id: Uuid, kind: NotificationKind) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(NotifyError::Rejected("mail relay offline".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((order_id, kind));
        Ok(())
    }
}

//! PostgreSQL implementation of every store, on top of a single SeaORM connection.
//!
//! Plain CRUD goes through the SeaORM entities; the catalog lookup, the notification ledger and the
//! audit log use raw sqlx queries on the same pool.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        personal_cart_items::{
            ActiveModel as PersonalItemActive, Column as PersonalItemCol, Entity as PersonalCartItems,
            Model as PersonalItemModel,
        },
        personal_carts::{ActiveModel as PersonalCartActive, Column as PersonalCartCol, Entity as PersonalCarts},
        preconfigured_cart_selections::{
            ActiveModel as SelectionActive, Column as SelectionCol, Entity as Selections,
            Model as SelectionModel,
        },
        preconfigured_carts::{
            Column as BundleCol, Entity as PreconfiguredCarts, Model as BundleModel,
        },
        recipe_cart_items::{
            ActiveModel as RecipeItemActive, Column as RecipeItemCol, Entity as RecipeCartItems,
            Model as RecipeItemModel,
        },
        recipe_carts::{ActiveModel as RecipeCartActive, Column as RecipeCartCol, Entity as RecipeCarts},
        recipe_ingredients::{Column as IngredientCol, Entity as RecipeIngredients},
        recipes::Entity as Recipes,
    },
    models::{
        BundleItem, CartItemRecord, DeliveryLocation, NotificationKind, Order, OrderStatus,
        PersonalCart, PreconfiguredBundle, PreconfiguredSelection, Product, RecipeCart,
    },
};

use super::{
    AuditEntry, AuditLog, NewOrder, NotificationLedger, OrderFilter, OrderPage, OrderStore,
    PersonalCartStore, PreconfiguredCartStore, ProductCatalog, RecipeCartStore, StatusChange,
    StoreError, StoreResult,
};

#[derive(Debug, Clone)]
pub struct PgStores {
    orm: DatabaseConnection,
}

impl PgStores {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    fn pool(&self) -> &PgPool {
        self.orm.get_postgres_connection_pool()
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: i64,
    unit: String,
    category: String,
}

#[async_trait]
impl ProductCatalog for PgStores {
    async fn products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price, unit, category
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Product {
                id: row.id,
                name: row.name,
                price: row.price,
                unit: row.unit,
                category: row.category,
            })
            .collect())
    }
}

fn personal_item_from_entity(model: PersonalItemModel) -> CartItemRecord {
    CartItemRecord {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        quantity: model.quantity,
    }
}

fn recipe_item_from_entity(model: RecipeItemModel) -> CartItemRecord {
    CartItemRecord {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        quantity: model.quantity,
    }
}

#[async_trait]
impl PersonalCartStore for PgStores {
    async fn personal_cart(&self, user_id: Uuid) -> StoreResult<Option<PersonalCart>> {
        let Some(cart) = PersonalCarts::find()
            .filter(PersonalCartCol::UserId.eq(user_id))
            .one(&self.orm)
            .await?
        else {
            return Ok(None);
        };

        let items = PersonalCartItems::find()
            .filter(PersonalItemCol::CartId.eq(cart.id))
            .order_by_asc(PersonalItemCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(personal_item_from_entity)
            .collect();

        Ok(Some(PersonalCart {
            id: cart.id,
            user_id: cart.user_id,
            items,
        }))
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord> {
        let txn = self.orm.begin().await?;

        let cart = PersonalCarts::find()
            .filter(PersonalCartCol::UserId.eq(user_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let cart = match cart {
            Some(cart) => cart,
            None => {
                PersonalCartActive {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    created_at: NotSet,
                }
                .insert(&txn)
                .await?
            }
        };

        let existing = PersonalCartItems::find()
            .filter(
                Condition::all()
                    .add(PersonalItemCol::CartId.eq(cart.id))
                    .add(PersonalItemCol::ProductId.eq(product_id)),
            )
            .one(&txn)
            .await?;

        let item = match existing {
            Some(item) => {
                let mut active: PersonalItemActive = item.into();
                active.quantity = Set(quantity);
                active.update(&txn).await?
            }
            None => {
                PersonalItemActive {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: NotSet,
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        Ok(personal_item_from_entity(item))
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<()> {
        let cart = PersonalCarts::find()
            .filter(PersonalCartCol::UserId.eq(user_id))
            .one(&self.orm)
            .await?
            .ok_or(StoreError::NotFound)?;

        let result = PersonalCartItems::delete_many()
            .filter(PersonalItemCol::CartId.eq(cart.id))
            .filter(PersonalItemCol::ProductId.eq(product_id))
            .exec(&self.orm)
            .await?;

        if result.rows_affected == 0 {
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
        PersonalCarts::find_by_id(cart_id)
            .filter(PersonalCartCol::UserId.eq(user_id))
            .one(&self.orm)
            .await?
            .ok_or(StoreError::NotFound)?;
        if item_ids.is_empty() {
            return Ok(());
        }

        PersonalCartItems::delete_many()
            .filter(PersonalItemCol::CartId.eq(cart_id))
            .filter(PersonalItemCol::Id.is_in(item_ids.iter().copied()))
            .exec(&self.orm)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecipeCartStore for PgStores {
    async fn recipe_carts(&self, user_id: Uuid) -> StoreResult<Vec<RecipeCart>> {
        let carts = RecipeCarts::find()
            .filter(RecipeCartCol::UserId.eq(user_id))
            .order_by_asc(RecipeCartCol::CreatedAt)
            .all(&self.orm)
            .await?;
        if carts.is_empty() {
            return Ok(Vec::new());
        }

        let mut items: HashMap<Uuid, Vec<CartItemRecord>> = HashMap::new();
        for item in RecipeCartItems::find()
            .filter(RecipeItemCol::CartId.is_in(carts.iter().map(|c| c.id)))
            .order_by_asc(RecipeItemCol::CreatedAt)
            .all(&self.orm)
            .await?
        {
            items
                .entry(item.cart_id)
                .or_default()
                .push(recipe_item_from_entity(item));
        }

        Ok(carts
            .into_iter()
            .map(|cart| RecipeCart {
                items: items.remove(&cart.id).unwrap_or_default(),
                id: cart.id,
                user_id: cart.user_id,
                recipe_id: cart.recipe_id,
                name: cart.name,
                created_at: cart.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    async fn create_from_recipe(&self, user_id: Uuid, recipe_id: Uuid) -> StoreResult<RecipeCart> {
        let txn = self.orm.begin().await?;

        let recipe = Recipes::find_by_id(recipe_id)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound)?;
        let ingredients = RecipeIngredients::find()
            .filter(IngredientCol::RecipeId.eq(recipe.id))
            .order_by_asc(IngredientCol::Position)
            .all(&txn)
            .await?;

        let cart = RecipeCartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            recipe_id: Set(recipe.id),
            name: Set(format!("Recette: {}", recipe.title)),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(ingredients.len());
        for ingredient in ingredients {
            let item = RecipeItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(ingredient.product_id),
                quantity: Set(ingredient.quantity),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            items.push(recipe_item_from_entity(item));
        }

        txn.commit().await?;

        Ok(RecipeCart {
            id: cart.id,
            user_id: cart.user_id,
            recipe_id: cart.recipe_id,
            name: cart.name,
            items,
            created_at: cart.created_at.with_timezone(&Utc),
        })
    }

    async fn set_item_quantity(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItemRecord> {
        let txn = self.orm.begin().await?;

        RecipeCarts::find_by_id(cart_id)
            .filter(RecipeCartCol::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound)?;

        let item = RecipeCartItems::find_by_id(item_id)
            .filter(RecipeItemCol::CartId.eq(cart_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut active: RecipeItemActive = item.into();
        active.quantity = Set(quantity);
        let item = active.update(&txn).await?;

        txn.commit().await?;
        Ok(recipe_item_from_entity(item))
    }

    async fn clear_recipe_cart(&self, user_id: Uuid, cart_id: Uuid) -> StoreResult<()> {
        // recipe_cart_items cascade on delete.
        let result = RecipeCarts::delete_many()
            .filter(RecipeCartCol::Id.eq(cart_id))
            .filter(RecipeCartCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn bundle_from_entity(model: BundleModel) -> StoreResult<PreconfiguredBundle> {
    let items: Vec<BundleItem> = serde_json::from_value(model.items)
        .map_err(|err| StoreError::Invalid(format!("bundle {} items: {err}", model.id)))?;
    Ok(PreconfiguredBundle {
        id: model.id,
        name: model.name,
        total_price: model.total_price,
        items,
    })
}

fn selection_from_entity(model: SelectionModel) -> PreconfiguredSelection {
    PreconfiguredSelection {
        selection_id: model.id,
        preconfigured_cart_id: model.preconfigured_cart_id,
    }
}

#[async_trait]
impl PreconfiguredCartStore for PgStores {
    async fn selections(&self, user_id: Uuid) -> StoreResult<Vec<PreconfiguredSelection>> {
        Ok(Selections::find()
            .filter(SelectionCol::UserId.eq(user_id))
            .order_by_asc(SelectionCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(selection_from_entity)
            .collect())
    }

    async fn bundles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<PreconfiguredBundle>> {
        PreconfiguredCarts::find()
            .filter(BundleCol::Id.is_in(ids.iter().copied()))
            .all(&self.orm)
            .await?
            .into_iter()
            .map(bundle_from_entity)
            .collect()
    }

    async fn list_bundles(&self) -> StoreResult<Vec<PreconfiguredBundle>> {
        PreconfiguredCarts::find()
            .order_by_asc(BundleCol::Name)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(bundle_from_entity)
            .collect()
    }

    async fn select(
        &self,
        user_id: Uuid,
        preconfigured_cart_id: Uuid,
    ) -> StoreResult<PreconfiguredSelection> {
        PreconfiguredCarts::find_by_id(preconfigured_cart_id)
            .one(&self.orm)
            .await?
            .ok_or(StoreError::NotFound)?;

        let selection = SelectionActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            preconfigured_cart_id: Set(preconfigured_cart_id),
            created_at: NotSet,
        }
        .insert(&self.orm)
        .await?;

        Ok(selection_from_entity(selection))
    }

    async fn remove_selection(&self, user_id: Uuid, selection_id: Uuid) -> StoreResult<()> {
        let result = Selections::delete_many()
            .filter(SelectionCol::Id.eq(selection_id))
            .filter(SelectionCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn order_from_entity(model: OrderModel) -> StoreResult<Order> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|err| StoreError::Invalid(err.to_string()))?;
    let line_items = serde_json::from_value(model.line_items)
        .map_err(|err| StoreError::Invalid(format!("order {} line items: {err}", model.id)))?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        line_items,
        total_amount: model.total_amount,
        delivery_fee: model.delivery_fee,
        delivery_location: DeliveryLocation {
            latitude: model.delivery_latitude,
            longitude: model.delivery_longitude,
        },
        delivery_notes: model.delivery_notes,
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

impl PgStores {
    async fn page_orders(&self, condition: Condition, filter: OrderFilter) -> StoreResult<OrderPage> {
        let mut condition = condition;
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let finder = Orders::find().filter(condition);
        let finder = if filter.oldest_first {
            finder.order_by_asc(OrderCol::CreatedAt)
        } else {
            finder.order_by_desc(OrderCol::CreatedAt)
        };

        let total = finder.clone().count(&self.orm).await?;
        let items = finder
            .limit((filter.limit > 0).then_some(filter.limit))
            .offset(filter.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(OrderPage { items, total })
    }
}

#[async_trait]
impl OrderStore for PgStores {
    async fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        let line_items = serde_json::to_value(&order.line_items)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;

        // A retried id keeps the row that is already there.
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, line_items, total_amount, delivery_fee,
                delivery_latitude, delivery_longitude, delivery_notes, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(line_items)
        .bind(order.total_amount)
        .bind(order.delivery_fee)
        .bind(order.delivery_location.latitude)
        .bind(order.delivery_location.longitude)
        .bind(order.delivery_notes)
        .bind(OrderStatus::Pending.as_str())
        .execute(self.pool())
        .await?;

        let stored = Orders::find_by_id(order.id)
            .filter(OrderCol::UserId.eq(order.user_id))
            .one(&self.orm)
            .await?
            .ok_or(StoreError::NotFound)?;
        order_from_entity(stored)
    }

    async fn orders_for_user(&self, user_id: Uuid, filter: OrderFilter) -> StoreResult<OrderPage> {
        self.page_orders(Condition::all().add(OrderCol::UserId.eq(user_id)), filter)
            .await
    }

    async fn order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
        Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::UserId.eq(user_id))
                    .add(OrderCol::Id.eq(order_id)),
            )
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn all_orders(&self, filter: OrderFilter) -> StoreResult<OrderPage> {
        self.page_orders(Condition::all(), filter).await
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> StoreResult<StatusChange> {
        let txn = self.orm.begin().await?;

        let existing = Orders::find_by_id(order_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(StoreError::NotFound)?;
        let old_status = existing
            .status
            .parse::<OrderStatus>()
            .map_err(|err| StoreError::Invalid(err.to_string()))?;

        let mut active: OrderActive = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        Ok(StatusChange {
            old_status,
            order: order_from_entity(updated)?,
        })
    }
}

#[async_trait]
impl NotificationLedger for PgStores {
    async fn claim(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_notifications (order_id, kind)
            VALUES ($1, $2)
            ON CONFLICT (order_id, kind) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(kind.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, order_id: Uuid, kind: NotificationKind) -> StoreResult<()> {
        sqlx::query("DELETE FROM order_notifications WHERE order_id = $1 AND kind = $2")
            .bind(order_id)
            .bind(kind.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLog for PgStores {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

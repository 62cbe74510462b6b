//! Readers for the three cart sources. Each one resolves product references against the catalog and
//! hands back uniform [`CartLineItem`]s, so nothing downstream has to care where a line came from.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{
        CartItemRecord, CartLineItem, PERSONAL_CART_LABEL, Product, SourceType, UNAVAILABLE_PRODUCT,
    },
    stores::{
        PersonalCartStore, PreconfiguredCartStore, ProductCatalog, RecipeCartStore, StoreError,
        StoreResult,
    },
};

/// A cart instance that fed the aggregated view, even when it contributed no lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceCartRef {
    pub source_type: SourceType,
    pub cart_id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLines {
    pub carts: Vec<SourceCartRef>,
    pub lines: Vec<CartLineItem>,
}

async fn resolve_products(
    catalog: &dyn ProductCatalog,
    items: &[&CartItemRecord],
) -> StoreResult<HashMap<Uuid, Product>> {
    let mut ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = catalog.products_by_ids(&ids).await?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

fn product_line(
    owner_user_id: Uuid,
    source: &SourceCartRef,
    item: &CartItemRecord,
    products: &HashMap<Uuid, Product>,
) -> StoreResult<CartLineItem> {
    if item.quantity <= 0 {
        return Err(StoreError::Invalid(format!(
            "line {} of {} cart {} has quantity {}",
            item.id, source.source_type, source.cart_id, item.quantity
        )));
    }
    let product = products.get(&item.product_id);
    if product.is_none() {
        tracing::debug!(product_id = %item.product_id, cart_id = %source.cart_id, "product reference no longer resolves");
    }
    Ok(CartLineItem {
        owner_user_id,
        source_type: source.source_type,
        source_cart_id: source.cart_id,
        source_cart_label: source.label.clone(),
        line_item_id: item.id,
        product_ref: Some(item.product_id),
        product_name: product.map_or_else(|| UNAVAILABLE_PRODUCT.to_string(), |p| p.name.clone()),
        quantity: item.quantity,
        unit_price: product.map_or(0, |p| p.price),
        unresolved: product.is_none(),
    })
}

pub async fn read_personal(
    catalog: &dyn ProductCatalog,
    store: &dyn PersonalCartStore,
    user_id: Uuid,
) -> StoreResult<SourceLines> {
    let Some(cart) = store.personal_cart(user_id).await?.filter(|c| !c.items.is_empty()) else {
        return Ok(SourceLines::default());
    };

    let items: Vec<&CartItemRecord> = cart.items.iter().collect();
    let products = resolve_products(catalog, &items).await?;
    let source = SourceCartRef {
        source_type: SourceType::Personal,
        cart_id: cart.id,
        label: PERSONAL_CART_LABEL.to_string(),
    };

    let lines = items
        .into_iter()
        .map(|item| product_line(user_id, &source, item, &products))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(SourceLines {
        carts: vec![source],
        lines,
    })
}

/// Lines of different recipe carts stay separate even when they reference the same product.
pub async fn read_recipe(
    catalog: &dyn ProductCatalog,
    store: &dyn RecipeCartStore,
    user_id: Uuid,
) -> StoreResult<SourceLines> {
    let carts = store.recipe_carts(user_id).await?;
    let items: Vec<&CartItemRecord> = carts.iter().flat_map(|c| c.items.iter()).collect();
    let products = resolve_products(catalog, &items).await?;

    let mut out = SourceLines::default();
    for cart in &carts {
        let source = SourceCartRef {
            source_type: SourceType::Recipe,
            cart_id: cart.id,
            label: cart.name.clone(),
        };
        for item in &cart.items {
            out.lines.push(product_line(user_id, &source, item, &products)?);
        }
        out.carts.push(source);
    }
    Ok(out)
}

/// One line per selection, priced with the bundle's stored `total_price`.
pub async fn read_preconfigured(
    store: &dyn PreconfiguredCartStore,
    user_id: Uuid,
) -> StoreResult<SourceLines> {
    let selections = store.selections(user_id).await?;
    if selections.is_empty() {
        return Ok(SourceLines::default());
    }

    let mut ids: Vec<Uuid> = selections.iter().map(|s| s.preconfigured_cart_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let bundles: HashMap<Uuid, _> = store
        .bundles_by_ids(&ids)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let mut out = SourceLines::default();
    for selection in selections {
        let bundle = bundles.get(&selection.preconfigured_cart_id);
        let label = bundle.map_or_else(|| UNAVAILABLE_PRODUCT.to_string(), |b| b.name.clone());
        out.lines.push(CartLineItem {
            owner_user_id: user_id,
            source_type: SourceType::Preconfigured,
            source_cart_id: selection.selection_id,
            source_cart_label: label.clone(),
            line_item_id: selection.selection_id,
            product_ref: None,
            product_name: label.clone(),
            quantity: 1,
            unit_price: bundle.map_or(0, |b| b.total_price),
            unresolved: bundle.is_none(),
        });
        out.carts.push(SourceCartRef {
            source_type: SourceType::Preconfigured,
            cart_id: selection.selection_id,
            label,
        });
    }
    Ok(out)
}

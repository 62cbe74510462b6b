//! Merges the personal, recipe and preconfigured carts into one read-only view.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{CartLineItem, SourceType},
    services::{
        cart_sources::{self, SourceCartRef, SourceLines},
        notices::{Notice, Notifier},
    },
    state::AppState,
    stores::StoreResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_type} cart could not be loaded: {reason}")]
pub struct SourceReadFailure {
    pub source_type: SourceType,
    pub reason: String,
}

/// Derived view over one user's carts. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AggregatedCart {
    pub owner_user_id: Uuid,
    pub line_items: Vec<CartLineItem>,
    pub source_carts: Vec<SourceCartRef>,
    pub failed_sources: Vec<SourceType>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartSection {
    pub source: SourceCartRef,
    pub items: Vec<CartLineItem>,
    pub section_total: i64,
}

impl AggregatedCart {
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// `false` when at least one source failed to load.
    pub fn is_complete(&self) -> bool {
        self.failed_sources.is_empty()
    }

    /// Lines grouped by originating cart, in display order.
    pub fn sections(&self) -> Vec<CartSection> {
        self.source_carts
            .iter()
            .map(|source| {
                let items: Vec<CartLineItem> = self
                    .line_items
                    .iter()
                    .filter(|l| l.source_type == source.source_type && l.source_cart_id == source.cart_id)
                    .cloned()
                    .collect();
                CartSection {
                    source: source.clone(),
                    section_total: items.iter().map(CartLineItem::line_total).sum(),
                    items,
                }
            })
            .collect()
    }
}

/// Pure merge. Order is Personal, Recipe, Preconfigured; a failed source contributes nothing.
pub fn aggregate(
    owner_user_id: Uuid,
    personal: Result<SourceLines, SourceReadFailure>,
    recipe: Result<SourceLines, SourceReadFailure>,
    preconfigured: Result<SourceLines, SourceReadFailure>,
    delivery_fee: i64,
) -> AggregatedCart {
    let mut line_items = Vec::new();
    let mut source_carts = Vec::new();
    let mut failed_sources = Vec::new();

    for outcome in [personal, recipe, preconfigured] {
        match outcome {
            Ok(source) => {
                line_items.extend(source.lines);
                source_carts.extend(source.carts);
            }
            Err(failure) => failed_sources.push(failure.source_type),
        }
    }

    let subtotal: i64 = line_items.iter().map(CartLineItem::line_total).sum();
    AggregatedCart {
        owner_user_id,
        line_items,
        source_carts,
        failed_sources,
        subtotal,
        delivery_fee,
        total: subtotal + delivery_fee,
    }
}

async fn settle<F>(
    source_type: SourceType,
    limit: Duration,
    read: F,
) -> Result<SourceLines, SourceReadFailure>
where
    F: Future<Output = StoreResult<SourceLines>>,
{
    match tokio::time::timeout(limit, read).await {
        Ok(Ok(lines)) => Ok(lines),
        Ok(Err(err)) => Err(SourceReadFailure {
            source_type,
            reason: err.to_string(),
        }),
        Err(_) => Err(SourceReadFailure {
            source_type,
            reason: format!("timed out after {}ms", limit.as_millis()),
        }),
    }
}

/// Reads all three sources concurrently and waits for every one of them to settle.
///
/// A failing source degrades to an empty list and raises a warning notice; it never fails the call.
#[tracing::instrument(skip(state, notifier))]
pub async fn load_aggregated_cart(
    state: &AppState,
    user_id: Uuid,
    notifier: &dyn Notifier,
) -> AggregatedCart {
    let limit = state.config.source_read_timeout;
    let (personal, recipe, preconfigured) = tokio::join!(
        settle(
            SourceType::Personal,
            limit,
            cart_sources::read_personal(state.catalog.as_ref(), state.personal_carts.as_ref(), user_id),
        ),
        settle(
            SourceType::Recipe,
            limit,
            cart_sources::read_recipe(state.catalog.as_ref(), state.recipe_carts.as_ref(), user_id),
        ),
        settle(
            SourceType::Preconfigured,
            limit,
            cart_sources::read_preconfigured(state.preconfigured.as_ref(), user_id),
        ),
    );

    for failure in [&personal, &recipe, &preconfigured]
        .into_iter()
        .filter_map(|outcome| outcome.as_ref().err())
    {
        tracing::warn!(source = %failure.source_type, reason = %failure.reason, "cart source read failed");
        notifier.notify(Notice::warning(format!(
            "Your {} cart could not be loaded right now",
            failure.source_type
        )));
    }

    let cart = aggregate(user_id, personal, recipe, preconfigured, state.config.delivery_fee);
    tracing::debug!(lines = cart.line_items.len(), subtotal = cart.subtotal, "cart aggregated");
    cart
}

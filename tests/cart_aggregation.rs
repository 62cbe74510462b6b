mod common;

use std::time::Duration;

use common::{customer, fill_basket, harness, harness_with};
use unified_cart_api::{
    config::AppConfig,
    models::{SourceType, UNAVAILABLE_PRODUCT},
    services::{
        aggregator::load_aggregated_cart,
        cart_service,
        notices::{NoticeBuffer, NoticeLevel},
    },
    stores::{PersonalCartStore, PreconfiguredCartStore, RecipeCartStore, memory::FailPoint},
};

#[tokio::test]
async fn merges_all_sources_in_display_order() {
    let h = harness();
    let user = customer();
    let basket = fill_basket(&h, &user).await;

    let response = cart_service::view_cart(&h.state, &user).await.expect("cart");
    let view = response.data.expect("cart view");

    assert!(!view.is_empty);
    assert!(view.notices.is_empty());

    let cart = &view.cart;
    assert_eq!(cart.owner_user_id, user.user_id);
    assert_eq!(cart.line_items.len(), 4);
    let sources: Vec<SourceType> = cart.line_items.iter().map(|l| l.source_type).collect();
    assert_eq!(
        sources,
        vec![
            SourceType::Personal,
            SourceType::Recipe,
            SourceType::Recipe,
            SourceType::Preconfigured
        ]
    );
    assert!(cart.line_items.iter().all(|l| l.owner_user_id == user.user_id));

    assert_eq!(cart.subtotal, 300 + 600 + 700 + 2500);
    assert_eq!(cart.delivery_fee, 1000);
    assert_eq!(cart.total, 5100);

    let labels: Vec<&str> = view.sections.iter().map(|s| s.source.label.as_str()).collect();
    assert_eq!(labels, vec!["Personal Cart", "Recette: Soupe", "Weekly Basics"]);
    assert_eq!(view.sections[1].section_total, 1300);
    assert_eq!(view.sections[1].source.cart_id, basket.recipe_cart_id);
    assert_eq!(view.sections[2].source.cart_id, basket.selection_id);
}

#[tokio::test]
async fn empty_cart_still_reports_the_delivery_fee() {
    let h = harness();
    let user = customer();

    let view = cart_service::view_cart(&h.state, &user)
        .await
        .expect("cart")
        .data
        .expect("cart view");

    assert!(view.is_empty);
    assert!(view.sections.is_empty());
    assert_eq!(view.cart.subtotal, 0);
    assert_eq!(view.cart.total, 1000);
}

#[tokio::test]
async fn failing_source_degrades_to_warning() {
    let h = harness();
    let user = customer();
    fill_basket(&h, &user).await;
    h.backend.fail(FailPoint::RecipeRead);

    let notices = NoticeBuffer::new();
    let cart = load_aggregated_cart(&h.state, user.user_id, &notices).await;

    assert_eq!(cart.failed_sources, vec![SourceType::Recipe]);
    assert!(!cart.is_complete());
    assert_eq!(cart.line_items.len(), 2);
    assert_eq!(cart.subtotal, 300 + 2500);

    let notices = notices.take();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert!(notices[0].message.contains("recipe"));
}

#[tokio::test]
async fn slow_source_times_out_without_blocking_the_others() {
    let mut config = AppConfig::new("postgres://unused", common::JWT_SECRET);
    config.source_read_timeout = Duration::from_millis(50);
    let h = harness_with(config);
    let user = customer();
    fill_basket(&h, &user).await;
    h.backend.delay(FailPoint::PersonalRead, Duration::from_secs(5));

    let notices = NoticeBuffer::new();
    let started = std::time::Instant::now();
    let cart = load_aggregated_cart(&h.state, user.user_id, &notices).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(cart.failed_sources, vec![SourceType::Personal]);
    assert_eq!(cart.subtotal, 1300 + 2500);
}

#[tokio::test]
async fn catalog_outage_fails_product_sources_only() {
    let h = harness();
    let user = customer();
    fill_basket(&h, &user).await;
    h.backend.fail(FailPoint::Catalog);

    let cart = load_aggregated_cart(&h.state, user.user_id, &NoticeBuffer::new()).await;

    assert_eq!(cart.failed_sources, vec![SourceType::Personal, SourceType::Recipe]);
    assert_eq!(cart.line_items.len(), 1);
    assert_eq!(cart.line_items[0].source_type, SourceType::Preconfigured);
}

#[tokio::test]
async fn deleted_product_shows_as_unavailable_at_zero_price() {
    let h = harness();
    let user = customer();
    let basket = fill_basket(&h, &user).await;
    h.backend.remove_product(basket.leek.id);

    let cart = load_aggregated_cart(&h.state, user.user_id, &NoticeBuffer::new()).await;

    let leek = cart
        .line_items
        .iter()
        .find(|l| l.product_ref == Some(basket.leek.id))
        .expect("leek line is kept");
    assert!(leek.unresolved);
    assert_eq!(leek.product_name, UNAVAILABLE_PRODUCT);
    assert_eq!(leek.unit_price, 0);
    assert_eq!(leek.line_total(), 0);
    assert_eq!(cart.subtotal, 300 + 600 + 2500);
    assert!(cart.is_complete());
}

#[tokio::test]
async fn retired_bundle_is_kept_as_unresolved_line() {
    let h = harness();
    let user = customer();
    let basket = fill_basket(&h, &user).await;
    let selections = h.backend.selections(user.user_id).await.expect("selections");
    let bundle_id = selections[0].preconfigured_cart_id;
    h.backend.remove_bundle(bundle_id);

    let cart = load_aggregated_cart(&h.state, user.user_id, &NoticeBuffer::new()).await;

    let line = cart
        .line_items
        .iter()
        .find(|l| l.source_cart_id == basket.selection_id)
        .expect("selection line");
    assert!(line.unresolved);
    assert_eq!(line.unit_price, 0);
    assert_eq!(cart.subtotal, 300 + 1300);
}

#[tokio::test]
async fn same_product_in_two_recipe_carts_is_not_merged() {
    let h = harness();
    let user = customer();
    let carrot = h.backend.add_product("Carrot", 200);
    let soup = h.backend.add_recipe("Soupe", &[(carrot.id, 3)]);
    let salad = h.backend.add_recipe("Salade", &[(carrot.id, 1)]);
    h.backend.create_from_recipe(user.user_id, soup).await.expect("soup cart");
    h.backend.create_from_recipe(user.user_id, salad).await.expect("salad cart");

    let cart = load_aggregated_cart(&h.state, user.user_id, &NoticeBuffer::new()).await;

    assert_eq!(cart.line_items.len(), 2);
    assert_ne!(cart.line_items[0].source_cart_id, cart.line_items[1].source_cart_id);
    assert_eq!(cart.subtotal, 800);
    assert_eq!(cart.sections().len(), 2);
}

#[tokio::test]
async fn stored_non_positive_quantity_fails_that_source() {
    let h = harness();
    let user = customer();
    let rice = h.backend.add_product("Rice", 150);
    h.backend.upsert_item(user.user_id, rice.id, 0).await.expect("raw write");

    let notices = NoticeBuffer::new();
    let cart = load_aggregated_cart(&h.state, user.user_id, &notices).await;

    assert_eq!(cart.failed_sources, vec![SourceType::Personal]);
    assert!(cart.is_empty());
    assert_eq!(notices.take().len(), 1);
}

#[tokio::test]
async fn personal_cart_edits_are_validated_and_audited() {
    let h = harness();
    let user = customer();
    let rice = h.backend.add_product("Rice", 150);

    let bad = cart_service::add_to_cart(
        &h.state,
        &user,
        unified_cart_api::dto::cart::AddToCartRequest {
            product_id: rice.id,
            quantity: 0,
        },
    )
    .await;
    assert!(bad.is_err());

    let unknown = cart_service::add_to_cart(
        &h.state,
        &user,
        unified_cart_api::dto::cart::AddToCartRequest {
            product_id: uuid::Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await;
    assert!(unknown.is_err());

    let item = cart_service::add_to_cart(
        &h.state,
        &user,
        unified_cart_api::dto::cart::AddToCartRequest {
            product_id: rice.id,
            quantity: 4,
        },
    )
    .await
    .expect("added")
    .data
    .expect("item");
    assert_eq!(item.quantity, 4);

    let cart = h.backend.personal_cart(user.user_id).await.expect("read").expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert!(h.backend.audit_entries().iter().any(|e| e.action == "cart_update"));

    cart_service::remove_from_cart(&h.state, &user, rice.id).await.expect("removed");
    let view = cart_service::view_cart(&h.state, &user).await.expect("cart").data.expect("view");
    assert!(view.is_empty);
}

#[tokio::test]
async fn recipe_cart_quantity_can_be_adjusted() {
    let h = harness();
    let user = customer();
    let basket = fill_basket(&h, &user).await;
    let carts = h.backend.recipe_carts(user.user_id).await.expect("carts");
    let carrot_line = carts[0]
        .items
        .iter()
        .find(|i| i.product_id == basket.carrot.id)
        .expect("carrot line")
        .id;

    cart_service::update_recipe_item(
        &h.state,
        &user,
        basket.recipe_cart_id,
        carrot_line,
        unified_cart_api::dto::cart::UpdateQuantityRequest { quantity: 5 },
    )
    .await
    .expect("updated");

    let cart = load_aggregated_cart(&h.state, user.user_id, &NoticeBuffer::new()).await;
    assert_eq!(cart.subtotal, 300 + 1000 + 700 + 2500);
    let audited = h
        .backend
        .audit_entries()
        .into_iter()
        .filter(|e| e.action == "recipe_cart_update")
        .collect::<Vec<_>>();
    assert_eq!(audited.len(), 1);
    assert_eq!(audited[0].user_id, Some(user.user_id));

    let other = customer();
    let denied = cart_service::update_recipe_item(
        &h.state,
        &other,
        basket.recipe_cart_id,
        carrot_line,
        unified_cart_api::dto::cart::UpdateQuantityRequest { quantity: 1 },
    )
    .await;
    assert!(denied.is_err(), "carts are scoped to their owner");
    assert_eq!(
        h.backend
            .audit_entries()
            .iter()
            .filter(|e| e.action == "recipe_cart_update")
            .count(),
        1
    );
}

use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{
        AddToCartRequest, BundleList, CartView, CreateRecipeCartRequest, SelectPreconfiguredRequest,
        UpdateQuantityRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::CurrentUser,
    models::{CartItemRecord, PreconfiguredSelection, RecipeCart},
    response::{ApiResponse, Meta},
    services::{aggregator::load_aggregated_cart, notices::NoticeBuffer},
    state::AppState,
};

fn ensure_positive(quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub async fn view_cart(state: &AppState, user: &CurrentUser) -> AppResult<ApiResponse<CartView>> {
    let notices = NoticeBuffer::new();
    let cart = load_aggregated_cart(state, user.user_id, &notices).await;
    let view = CartView::new(cart, notices.take());
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &CurrentUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItemRecord>> {
    ensure_positive(payload.quantity)?;

    let known = state.catalog.products_by_ids(&[payload.product_id]).await?;
    if known.is_empty() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let item = state
        .personal_carts
        .upsert_item(user.user_id, payload.product_id, payload.quantity)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "cart_update",
        Some("personal_cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await;

    Ok(ApiResponse::success("OK", item, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &CurrentUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state
        .personal_carts
        .remove_item(user.user_id, product_id)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "cart_remove",
        Some("personal_cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::done("Removed from cart"))
}

pub async fn create_recipe_cart(
    state: &AppState,
    user: &CurrentUser,
    payload: CreateRecipeCartRequest,
) -> AppResult<ApiResponse<RecipeCart>> {
    let cart = state
        .recipe_carts
        .create_from_recipe(user.user_id, payload.recipe_id)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "recipe_cart_create",
        Some("recipe_carts"),
        Some(serde_json::json!({ "recipe_id": payload.recipe_id, "cart_id": cart.id })),
    )
    .await;

    Ok(ApiResponse::success("Recipe cart created", cart, Some(Meta::empty())))
}

pub async fn update_recipe_item(
    state: &AppState,
    user: &CurrentUser,
    cart_id: Uuid,
    item_id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<CartItemRecord>> {
    ensure_positive(payload.quantity)?;
    let item = state
        .recipe_carts
        .set_item_quantity(user.user_id, cart_id, item_id, payload.quantity)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "recipe_cart_update",
        Some("recipe_cart_items"),
        Some(serde_json::json!({ "cart_id": cart_id, "item_id": item_id, "quantity": payload.quantity })),
    )
    .await;

    Ok(ApiResponse::success("Recipe cart updated", item, None))
}

pub async fn remove_recipe_cart(
    state: &AppState,
    user: &CurrentUser,
    cart_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state
        .recipe_carts
        .clear_recipe_cart(user.user_id, cart_id)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "recipe_cart_remove",
        Some("recipe_carts"),
        Some(serde_json::json!({ "cart_id": cart_id })),
    )
    .await;

    Ok(ApiResponse::done("Recipe cart removed"))
}

pub async fn list_bundles(state: &AppState) -> AppResult<ApiResponse<BundleList>> {
    let items = state.preconfigured.list_bundles().await?;
    let meta = Meta::whole(items.len());
    Ok(ApiResponse::success("OK", BundleList { items }, Some(meta)))
}

pub async fn select_bundle(
    state: &AppState,
    user: &CurrentUser,
    payload: SelectPreconfiguredRequest,
) -> AppResult<ApiResponse<PreconfiguredSelection>> {
    let selection = state
        .preconfigured
        .select(user.user_id, payload.preconfigured_cart_id)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "preconfigured_select",
        Some("preconfigured_cart_selections"),
        Some(serde_json::json!({ "preconfigured_cart_id": payload.preconfigured_cart_id })),
    )
    .await;

    Ok(ApiResponse::success("Bundle added to cart", selection, None))
}

pub async fn remove_bundle_selection(
    state: &AppState,
    user: &CurrentUser,
    selection_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state
        .preconfigured
        .remove_selection(user.user_id, selection_id)
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "preconfigured_remove",
        Some("preconfigured_cart_selections"),
        Some(serde_json::json!({ "selection_id": selection_id })),
    )
    .await;

    Ok(ApiResponse::done("Bundle removed from cart"))
}

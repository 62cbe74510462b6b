use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddToCartRequest, BundleList, CartView, CreateRecipeCartRequest,
        SelectPreconfiguredRequest, UpdateQuantityRequest,
    },
    error::AppResult,
    middleware::auth::CurrentUser,
    models::{CartItemRecord, PreconfiguredSelection, RecipeCart},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_view))
        .route("/items", post(add_to_cart))
        .route("/items/{product_id}", delete(remove_from_cart))
        .route("/recipes", post(create_recipe_cart))
        .route("/recipes/{cart_id}", delete(remove_recipe_cart))
        .route(
            "/recipes/{cart_id}/items/{item_id}",
            patch(update_recipe_item),
        )
        .route("/preconfigured", post(select_bundle))
        .route("/preconfigured/{selection_id}", delete(remove_bundle_selection))
}

pub fn bundle_router() -> Router<AppState> {
    Router::new().route("/", get(list_bundles))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Aggregated cart across personal, recipe and preconfigured carts", body = ApiResponse<CartView>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_view(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::view_cart(&state, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add or update personal cart item", body = ApiResponse<CartItemRecord>),
        (status = 400, description = "Bad request"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItemRecord>>> {
    let response = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = cart_service::remove_from_cart(&state, &user, product_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart/recipes",
    request_body = CreateRecipeCartRequest,
    responses(
        (status = 200, description = "Recipe cart created from the recipe ingredients", body = ApiResponse<RecipeCart>),
        (status = 404, description = "Recipe not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn create_recipe_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateRecipeCartRequest>,
) -> AppResult<Json<ApiResponse<RecipeCart>>> {
    let response = cart_service::create_recipe_cart(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/api/cart/recipes/{cart_id}/items/{item_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Recipe cart ID"),
        ("item_id" = Uuid, Path, description = "Recipe cart item ID")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartItemRecord>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_recipe_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((cart_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<ApiResponse<CartItemRecord>>> {
    let response =
        cart_service::update_recipe_item(&state, &user, cart_id, item_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/cart/recipes/{cart_id}",
    params(
        ("cart_id" = Uuid, Path, description = "Recipe cart ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Recipe cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_recipe_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(cart_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = cart_service::remove_recipe_cart(&state, &user, cart_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/preconfigured-carts",
    responses(
        (status = 200, description = "Available preconfigured bundles", body = ApiResponse<BundleList>)
    ),
    tag = "Cart"
)]
pub async fn list_bundles(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BundleList>>> {
    let response = cart_service::list_bundles(&state).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart/preconfigured",
    request_body = SelectPreconfiguredRequest,
    responses(
        (status = 200, description = "Bundle added to the cart", body = ApiResponse<PreconfiguredSelection>),
        (status = 404, description = "Bundle not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn select_bundle(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SelectPreconfiguredRequest>,
) -> AppResult<Json<ApiResponse<PreconfiguredSelection>>> {
    let response = cart_service::select_bundle(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/cart/preconfigured/{selection_id}",
    params(
        ("selection_id" = Uuid, Path, description = "Selection ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Selection not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_bundle_selection(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(selection_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = cart_service::remove_bundle_selection(&state, &user, selection_id).await?;
    Ok(Json(response))
}

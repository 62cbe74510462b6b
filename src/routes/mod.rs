use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod webhooks;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart::router())
        .nest("/preconfigured-carts", cart::bundle_router())
        .nest("/checkout", orders::checkout_router())
        .nest("/orders", orders::route())
        .nest("/admin", admin::router())
        .nest("/webhooks", webhooks::router())
}

#![allow(dead_code)]

use std::sync::Arc;

use unified_cart_api::{
    config::AppConfig,
    middleware::auth::CurrentUser,
    models::{BundleItem, DeliveryLocation, Product},
    state::AppState,
    stores::{PersonalCartStore, PreconfiguredCartStore, RecipeCartStore, memory::{InMemoryBackend, RecordingMailer}},
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

pub const DAKAR: DeliveryLocation = DeliveryLocation {
    latitude: 14.7167,
    longitude: -17.4677,
};

pub struct Harness {
    pub state: AppState,
    pub backend: Arc<InMemoryBackend>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn harness() -> Harness {
    harness_with(AppConfig::new("postgres://unused", JWT_SECRET))
}

pub fn harness_with(config: AppConfig) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let mailer = Arc::new(RecordingMailer::new());
    let state = AppState::in_memory(config, backend.clone(), mailer.clone());
    Harness {
        state,
        backend,
        mailer,
    }
}

pub fn customer() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    }
}

/// Products and carts shared by most scenarios.
pub struct Basket {
    pub rice: Product,
    pub carrot: Product,
    pub leek: Product,
    pub recipe_cart_id: Uuid,
    pub selection_id: Uuid,
}

/// Personal: 2 x Rice @150. Recipe "Soupe": 3 x Carrot @200, 2 x Leek @350.
/// Preconfigured: "Weekly Basics" @2500. Subtotal 4100.
pub async fn fill_basket(h: &Harness, user: &CurrentUser) -> Basket {
    let rice = h.backend.add_product("Rice", 150);
    let carrot = h.backend.add_product("Carrot", 200);
    let leek = h.backend.add_product("Leek", 350);

    h.backend
        .upsert_item(user.user_id, rice.id, 2)
        .await
        .expect("personal item");

    let recipe_id = h.backend.add_recipe("Soupe", &[(carrot.id, 3), (leek.id, 2)]);
    let recipe_cart = h
        .backend
        .create_from_recipe(user.user_id, recipe_id)
        .await
        .expect("recipe cart");

    let bundle = h.backend.add_bundle(
        "Weekly Basics",
        2500,
        vec![BundleItem {
            product_id: rice.id,
            quantity: 5,
        }],
    );
    let selection = h
        .backend
        .select(user.user_id, bundle.id)
        .await
        .expect("bundle selection");

    Basket {
        rice,
        carrot,
        leek,
        recipe_cart_id: recipe_cart.id,
        selection_id: selection.selection_id,
    }
}

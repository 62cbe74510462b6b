use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::PreconfiguredBundle,
    services::{
        aggregator::{AggregatedCart, CartSection},
        notices::Notice,
    },
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecipeCartRequest {
    pub recipe_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectPreconfiguredRequest {
    pub preconfigured_cart_id: Uuid,
}

/// Aggregated cart as rendered by the cart page.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub is_empty: bool,
    pub cart: AggregatedCart,
    pub sections: Vec<CartSection>,
    pub notices: Vec<Notice>,
}

impl CartView {
    pub fn new(cart: AggregatedCart, notices: Vec<Notice>) -> Self {
        Self {
            is_empty: cart.is_empty(),
            sections: cart.sections(),
            cart,
            notices,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct BundleList {
    #[schema(value_type = Vec<PreconfiguredBundle>)]
    pub items: Vec<PreconfiguredBundle>,
}

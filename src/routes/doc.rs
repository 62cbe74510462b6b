use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{
            AddToCartRequest, BundleList, CartView, CreateRecipeCartRequest,
            SelectPreconfiguredRequest, UpdateQuantityRequest,
        },
        orders::{
            CheckoutPayload, CheckoutReadiness, CheckoutResult, OrderList, StatusUpdateResult,
            UpdateOrderStatusRequest,
        },
        webhooks::{OrderRecord, OrderWebhookPayload},
    },
    models::{
        BundleItem, CartItemRecord, CartLineItem, DeliveryLocation, Order, OrderStatus,
        PreconfiguredBundle, PreconfiguredSelection, RecipeCart, SnapshotLine, SourceType,
    },
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, webhooks},
    services::{
        aggregator::{AggregatedCart, CartSection},
        cart_sources::SourceCartRef,
        checkout::{CheckoutGuard, CheckoutReceipt, ClearOutcome},
        notices::{Notice, NoticeLevel},
        order_status::ProjectionOutcome,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_view,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::create_recipe_cart,
        cart::update_recipe_item,
        cart::remove_recipe_cart,
        cart::list_bundles,
        cart::select_bundle,
        cart::remove_bundle_selection,
        orders::checkout,
        orders::checkout_readiness,
        orders::list_order,
        orders::get_order,
        admin::list_all_orders,
        admin::update_order_status,
        webhooks::order_status_webhook
    ),
    components(
        schemas(
            SourceType,
            CartLineItem,
            SnapshotLine,
            DeliveryLocation,
            OrderStatus,
            Order,
            CartItemRecord,
            RecipeCart,
            PreconfiguredSelection,
            BundleItem,
            PreconfiguredBundle,
            AggregatedCart,
            CartSection,
            SourceCartRef,
            Notice,
            NoticeLevel,
            CheckoutGuard,
            CheckoutReceipt,
            ClearOutcome,
            ProjectionOutcome,
            AddToCartRequest,
            CreateRecipeCartRequest,
            UpdateQuantityRequest,
            SelectPreconfiguredRequest,
            CartView,
            BundleList,
            CheckoutPayload,
            CheckoutResult,
            CheckoutReadiness,
            UpdateOrderStatusRequest,
            StatusUpdateResult,
            OrderList,
            OrderWebhookPayload,
            OrderRecord,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResult>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Personal, recipe and preconfigured cart endpoints"),
        (name = "Checkout", description = "Order submission endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Webhooks", description = "Database webhook receivers"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use unified_cart_api::{app::build_app, middleware::auth::Claims};
use uuid::Uuid;

use common::{Harness, JWT_SECRET, harness};

fn token(user_id: Uuid, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.into(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token")
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn app(h: &Harness) -> Router {
    build_app(h.state.clone())
}

#[tokio::test]
async fn health_and_fallback() {
    let h = harness();
    let app = app(&h);

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = call(&app, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/nope");
}

#[tokio::test]
async fn cart_requires_a_bearer_token() {
    let h = harness();
    let app = app(&h);

    let (status, body) = call(&app, Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap_or_default().contains("Authorization"));

    let (status, _) = call(&app, Method::GET, "/api/cart", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn browse_checkout_and_validate_over_http() {
    let h = harness();
    let app = app(&h);
    let user_id = Uuid::new_v4();
    let user = token(user_id, "user");
    let admin = token(Uuid::new_v4(), "admin");

    let rice = h.backend.add_product("Rice", 150);
    let carrot = h.backend.add_product("Carrot", 200);
    let recipe_id = h.backend.add_recipe("Soupe", &[(carrot.id, 3)]);
    let bundle = h.backend.add_bundle("Weekly Basics", 2500, Vec::new());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&user),
        Some(json!({ "product_id": rice.id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/cart/recipes",
        Some(&user),
        Some(json!({ "recipe_id": recipe_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Recette: Soupe");

    let (status, bundles) = call(&app, Method::GET, "/api/preconfigured-carts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bundles["data"][0]["name"], "Weekly Basics");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/cart/preconfigured",
        Some(&user),
        Some(json!({ "preconfigured_cart_id": bundle.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, cart) = call(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["data"]["cart"]["subtotal"], 300 + 600 + 2500);
    assert_eq!(cart["data"]["cart"]["total"], 4400);
    assert_eq!(cart["data"]["sections"].as_array().map(Vec::len), Some(3));
    assert_eq!(cart["data"]["cart"]["line_items"][0]["sourceType"], "personal");

    let (status, body) = call(&app, Method::POST, "/api/checkout", Some(&user), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["guard"]["reason"], "missing_location");
    assert_eq!(h.backend.create_order_calls(), 0);

    let (status, readiness) = call(
        &app,
        Method::GET,
        "/api/checkout/readiness?latitude=14.7167&longitude=-17.4677",
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["data"]["can_submit"], true);

    let (status, placed) = call(
        &app,
        Method::POST,
        "/api/checkout",
        Some(&user),
        Some(json!({
            "location": { "latitude": 14.7167, "longitude": -17.4677 },
            "notes": "Ring twice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(placed["data"]["order"]["total_amount"], 4400);
    assert_eq!(placed["data"]["order"]["status"], "pending");
    assert_eq!(placed["data"]["housekeeping"].as_array().map(Vec::len), Some(3));
    let order_id = placed["data"]["order"]["id"].as_str().expect("order id").to_string();

    let (_, cart) = call(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert_eq!(cart["data"]["is_empty"], true);

    let (status, orders) = call(&app, Method::GET, "/api/orders?page=1&per_page=5", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["data"]["items"][0]["id"], order_id.as_str());
    assert_eq!(orders["meta"]["total"], 1);

    let status_uri = format!("/api/admin/orders/{order_id}/status");
    let (status, _) = call(
        &app,
        Method::PATCH,
        &status_uri,
        Some(&user),
        Some(json!({ "status": "validated" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &status_uri,
        Some(&admin),
        Some(json!({ "status": "validated" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["previous_status"], "pending");
    assert_eq!(updated["data"]["notification"]["outcome"], "sent");
    assert_eq!(updated["data"]["notification"]["kind"], "validation");
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn second_checkout_of_an_emptied_cart_is_refused() {
    let h = harness();
    let app = app(&h);
    let user = token(Uuid::new_v4(), "user");
    let rice = h.backend.add_product("Rice", 150);
    call(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&user),
        Some(json!({ "product_id": rice.id, "quantity": 1 })),
    )
    .await;

    let payload = json!({ "location": { "latitude": 0.0, "longitude": 0.0 } });
    let (first, _) = call(&app, Method::POST, "/api/checkout", Some(&user), Some(payload.clone())).await;
    let (second, body) = call(&app, Method::POST, "/api/checkout", Some(&user), Some(payload)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["guard"]["reason"], "empty_cart");
    assert_eq!(h.backend.create_order_calls(), 1);
}

#[tokio::test]
async fn webhook_endpoint_checks_the_shared_secret() {
    let mut config = unified_cart_api::config::AppConfig::new("postgres://unused", JWT_SECRET);
    config.webhook_secret = Some("hook".into());
    let h = common::harness_with(config);
    let app = app(&h);
    let order_id = Uuid::new_v4();
    let event = json!({
        "type": "UPDATE",
        "table": "orders",
        "record": { "id": order_id, "status": "delivered" },
        "old_record": { "id": order_id, "status": "in_transit" }
    });

    let (status, _) = call(&app, Method::POST, "/api/webhooks/order-status", None, Some(event.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/order-status")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-secret", "hook")
        .body(Body::from(event.to_string()))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.mailer.sent().len(), 1);
}

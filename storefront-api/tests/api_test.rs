use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{app, auth::issue_token, state::{AppState, AuthConfig}};
use storefront_core::payment::MockPaymentGateway;
use storefront_core::repository::InMemoryProductRepository;
use storefront_core::{Masked, Payment, PaymentStatus, Product, Role};
use storefront_order::{InMemoryOrderRepository, OrderReconciler};

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    gateway: Arc<MockPaymentGateway>,
    product_a: Product,
    product_b: Product,
}

fn test_app() -> TestApp {
    test_app_with(MockPaymentGateway::new())
}

fn test_app_with(gateway: MockPaymentGateway) -> TestApp {
    let product_a = Product::new("Remera TURRS", Decimal::new(1000, 2)).with_image("https://cdn.example.test/remera.png");
    let product_b = Product::new("Gorra", Decimal::new(500, 2));

    let gateway = Arc::new(gateway);
    let reconciler = OrderReconciler::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemoryProductRepository::with_products(vec![product_a.clone(), product_b.clone()])),
        gateway.clone(),
    );

    let state = AppState {
        reconciler: Arc::new(reconciler),
        auth: AuthConfig { secret: Masked::from(SECRET) },
    };

    TestApp { router: app(state), gateway, product_a, product_b }
}

fn token(user_id: &str, role: Role) -> String {
    issue_token(SECRET, user_id, role, 3600).unwrap()
}

async fn send(router: &Router, method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn checkout_body(app: &TestApp, payment_method: &str) -> Value {
    json!({
        "items": [
            { "productId": app.product_a.id, "quantity": 2 },
            { "productId": app.product_b.id, "quantity": 1 }
        ],
        "shippingAddress": {
            "street": "Av. Siempre Viva 742",
            "city": "Springfield",
            "state": "Buenos Aires",
            "zipCode": "1900",
            "country": "AR"
        },
        "paymentMethod": payment_method,
        "total": 0.01
    })
}

async fn place_order(app: &TestApp, bearer: &str) -> Value {
    let (status, body) = send(&app.router, "POST", "/api/orders", Some(bearer), Some(checkout_body(app, "gateway"))).await;
    assert_eq!(status, StatusCode::CREATED);
    json_body(&body)
}

fn webhook(payment_id: &str) -> Value {
    json!({ "type": "payment", "data": { "id": payment_id } })
}

#[tokio::test]
async fn test_checkout_to_paid_flow() {
    let app = test_app();
    let alice = token("alice", Role::Customer);

    let created = place_order(&app, &alice).await;
    assert_eq!(created["total"], json!(25.0));
    assert_eq!(created["status"], "pending");
    assert_eq!(created["userId"], "alice");
    assert!(created["payment"]["init_point"].as_str().is_some());
    assert!(created["paymentError"].is_null());

    let order_id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/payments/create-preference",
        Some(&alice),
        Some(json!({ "orderId": order_id, "items": [{ "title": "free", "unit_price": 0 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let redirect = json_body(&body);
    assert!(redirect["id"].as_str().is_some());
    assert!(redirect["init_point"].as_str().unwrap().contains(redirect["id"].as_str().unwrap()));
    assert!(redirect["sandbox_init_point"].as_str().is_some());

    let preferences = app.gateway.preferences().await;
    let (_, items) = preferences.last().unwrap();
    assert_eq!(items[0].title, "Remera TURRS");
    assert_eq!(items[0].unit_price, Decimal::new(1000, 2));

    app.gateway
        .insert_payment(Payment::new("987", PaymentStatus::Approved, Some(order_id.clone())))
        .await;

    let (status, body) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("987"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["status"], "paid");
    assert_eq!(order["paymentId"], "987");
    assert_eq!(order["items"][0]["product"]["name"], "Remera TURRS");
}

#[tokio::test]
async fn test_duplicate_webhook_is_acknowledged() {
    let app = test_app();
    let alice = token("alice", Role::Customer);
    let order_id = place_order(&app, &alice).await["id"].as_str().unwrap().to_string();

    app.gateway
        .insert_payment(Payment::new("555", PaymentStatus::Approved, Some(order_id.clone())))
        .await;

    for _ in 0..2 {
        let (status, body) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("555"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    let (_, body) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), Some(&alice), None).await;
    assert_eq!(json_body(&body)["status"], "paid");
}

#[tokio::test]
async fn test_forged_webhook_does_not_mark_paid() {
    let app = test_app();
    let alice = token("alice", Role::Customer);
    let order_id = place_order(&app, &alice).await["id"].as_str().unwrap().to_string();

    app.gateway
        .insert_payment(Payment::new("666", PaymentStatus::Rejected, Some(order_id.clone())))
        .await;

    let forged = json!({
        "type": "payment",
        "data": { "id": "666", "status": "approved" },
        "status": "approved",
        "external_reference": order_id
    });
    let (status, _) = send(&app.router, "POST", "/api/payments/webhook", None, Some(forged)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "GET", &format!("/api/orders/{}", order_id), Some(&alice), None).await;
    assert_eq!(json_body(&body)["status"], "pending");
}

#[tokio::test]
async fn test_webhook_ignores_malformed_and_unknown_input() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/webhook",
        None,
        Some(json!({ "type": "merchant_order", "data": { "id": "1" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("does-not-exist"))).await;
    assert_eq!(status, StatusCode::OK);

    app.gateway
        .insert_payment(Payment::new("777", PaymentStatus::Approved, Some(Uuid::new_v4().to_string())))
        .await;
    let (status, _) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("777"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_fails_when_provider_is_down() {
    let app = test_app();
    app.gateway.set_failing(true);

    let (status, body) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("123"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Error");
}

#[tokio::test]
async fn test_order_survives_gateway_outage() {
    let app = test_app_with(MockPaymentGateway::failing());
    let alice = token("alice", Role::Customer);

    let created = place_order(&app, &alice).await;
    assert_eq!(created["status"], "pending");
    assert!(created["payment"].is_null());
    assert!(created["paymentError"].as_str().is_some());

    let order_id = created["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/create-preference",
        Some(&alice),
        Some(json!({ "orderId": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    app.gateway.set_failing(false);
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/create-preference",
        Some(&alice),
        Some(json!({ "orderId": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_offline_payment_method_skips_gateway() {
    let app = test_app();
    let alice = token("alice", Role::Customer);

    let (status, body) = send(&app.router, "POST", "/api/orders", Some(&alice), Some(checkout_body(&app, "paypal"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_body(&body);
    assert_eq!(created["paymentMethod"], "paypal");
    assert!(created["payment"].is_null());
    assert!(created["paymentError"].is_null());
    assert!(app.gateway.preferences().await.is_empty());
}

#[tokio::test]
async fn test_invalid_checkout_is_rejected() {
    let app = test_app();
    let alice = token("alice", Role::Customer);

    let mut body = checkout_body(&app, "gateway");
    body["items"] = json!([]);
    let (status, response) = send(&app.router, "POST", "/api/orders", Some(&alice), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["error"].as_str().is_some());

    let mut body = checkout_body(&app, "gateway");
    body["items"] = json!([{ "productId": app.product_a.id, "quantity": 4_294_967_295u64 }]);
    let (status, _) = send(&app.router, "POST", "/api/orders", Some(&alice), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = checkout_body(&app, "gateway");
    body["items"] = json!([{ "productId": Uuid::new_v4(), "quantity": 1 }]);
    let (status, _) = send(&app.router, "POST", "/api/orders", Some(&alice), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authentication_is_required() {
    let app = test_app();

    let (status, _) = send(&app.router, "GET", "/api/orders/my-orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, "GET", "/api/orders/my-orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = issue_token(SECRET, "alice", Role::Customer, -3600).unwrap();
    let (status, _) = send(&app.router, "GET", "/api/orders/my-orders", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = issue_token("other-secret", "alice", Role::Customer, 3600).unwrap();
    let (status, _) = send(&app.router, "GET", "/api/orders/my-orders", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_access_rules() {
    let app = test_app();
    let alice = token("alice", Role::Customer);
    let bob = token("bob", Role::Customer);
    let admin = token("root", Role::Admin);

    let order_id = place_order(&app, &alice).await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{}", order_id);

    let (status, _) = send(&app.router, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app.router, "GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, "GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "GET", &format!("/api/orders/{}", Uuid::new_v4()), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "GET", "/api/orders", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app.router, "GET", "/api/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, "GET", "/api/orders/my-orders", Some(&bob), None).await;
    assert!(json_body(&body).as_array().unwrap().is_empty());
    let (_, body) = send(&app.router, "GET", "/api/orders/my-orders", Some(&alice), None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/payments/create-preference",
        Some(&bob),
        Some(json!({ "orderId": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_status_updates() {
    let app = test_app();
    let alice = token("alice", Role::Customer);
    let admin = token("root", Role::Admin);

    let order_id = place_order(&app, &alice).await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/orders/{}", order_id);

    let (status, _) = send(&app.router, "PUT", &uri, Some(&alice), Some(json!({ "status": "shipped" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, "PUT", &uri, Some(&admin), Some(json!({ "status": "paid" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "status": "cancelled", "total": 0, "userId": "mallory" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["total"], json!(25.0));
    assert_eq!(order["userId"], "alice");

    app.gateway
        .insert_payment(Payment::new("888", PaymentStatus::Approved, Some(order_id.clone())))
        .await;
    let (status, _) = send(&app.router, "POST", "/api/payments/webhook", None, Some(webhook("888"))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "GET", &uri, Some(&admin), None).await;
    assert_eq!(json_body(&body)["status"], "cancelled");
}

#[tokio::test]
async fn test_payment_lookup_authorization() {
    let app = test_app();
    let alice = token("alice", Role::Customer);
    let bob = token("bob", Role::Customer);
    let admin = token("root", Role::Admin);

    let order_id = place_order(&app, &alice).await["id"].as_str().unwrap().to_string();
    app.gateway
        .insert_payment(Payment::new("321", PaymentStatus::Pending, Some(order_id)))
        .await;

    let (status, body) = send(&app.router, "GET", "/api/payments/321", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "pending");

    let (status, _) = send(&app.router, "GET", "/api/payments/321", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, "GET", "/api/payments/321", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "GET", "/api/payments/404404", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

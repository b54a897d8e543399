use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let authenticated = Router::new()
        .route("/api/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/orders/my-orders", get(orders::list_my_orders))
        .route("/api/orders/{id}", get(orders::get_order).put(orders::update_order))
        .route("/api/payments/create-preference", post(payments::create_preference))
        .route("/api/payments/{payment_id}", get(payments::get_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Called by the payment provider, which carries no bearer token.
    let public = Router::new().route("/api/payments/webhook", post(webhooks::handle_payment_webhook));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

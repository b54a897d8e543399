use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use storefront_core::{Identity, PaymentRedirect};
use storefront_order::{CheckoutRequest, Order, OrderPatch, PaymentInitiation, ResolvedOrder};

use crate::{error::AppError, state::AppState};

// ============================================================================
// Response Types
// ============================================================================

/// The created order plus whatever came of the payment hand-off.
///
/// `payment` is `null` when the method does not use the hosted gateway or
/// when the preference could not be created; in the latter case
/// `paymentError` says why and the client may retry via create-preference.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub payment: Option<PaymentRedirect>,
    pub payment_error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let checkout = state.reconciler.place_order(&identity, request).await?;

    let (payment, payment_error) = match checkout.payment {
        PaymentInitiation::NotRequired => (None, None),
        PaymentInitiation::Redirect(redirect) => (Some(redirect), None),
        PaymentInitiation::Failed(e) => (None, Some(e.to_string())),
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order: checkout.order,
            payment,
            payment_error,
        }),
    ))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ResolvedOrder>>, AppError> {
    Ok(Json(state.reconciler.list_orders(&identity).await?))
}

/// GET /api/orders/my-orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ResolvedOrder>>, AppError> {
    Ok(Json(state.reconciler.list_my_orders(&identity).await?))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ResolvedOrder>, AppError> {
    Ok(Json(state.reconciler.get_order(&identity, order_id).await?))
}

/// PUT /api/orders/{id}
pub async fn update_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
    Json(patch): Json<OrderPatch>,
) -> Result<Json<ResolvedOrder>, AppError> {
    Ok(Json(state.reconciler.update_order(&identity, order_id, patch).await?))
}

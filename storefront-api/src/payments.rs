use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use storefront_core::{Identity, Payment, PaymentRedirect};

use crate::{error::AppError, state::AppState};

/// Only the order id is read. Client-sent `items` are ignored; the
/// preference is always priced from the stored order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreferenceRequest {
    pub order_id: Uuid,
}

/// POST /api/payments/create-preference
pub async fn create_preference(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreatePreferenceRequest>,
) -> Result<Json<PaymentRedirect>, AppError> {
    let redirect = state.reconciler.create_preference(&identity, request.order_id).await?;
    Ok(Json(redirect))
}

/// GET /api/payments/{payment_id}
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.reconciler.get_payment(&identity, &payment_id).await?))
}

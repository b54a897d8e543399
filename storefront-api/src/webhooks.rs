use axum::{body::Bytes, extract::State, http::StatusCode};

use storefront_order::{NotificationOutcome, PaymentNotification};

use crate::state::AppState;

/// POST /api/payments/webhook
///
/// Acknowledges with 200 whenever the notification was handled or safely
/// ignored. 500 is returned only when the provider or the store failed, so
/// the provider redelivers.
pub async fn handle_payment_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let Some(notification) = PaymentNotification::from_slice(&body) else {
        tracing::warn!("Ignoring unparseable webhook body ({} bytes)", body.len());
        return (StatusCode::OK, "OK");
    };

    tracing::info!(
        "Received webhook: {:?} for payment {:?}",
        notification.kind,
        notification.data.as_ref().map(|d| d.id.as_str())
    );

    match state.reconciler.handle_notification(&notification).await {
        Ok(NotificationOutcome::MarkedPaid { order_id }) => {
            tracing::info!("Order {} marked as paid via webhook", order_id);
            (StatusCode::OK, "OK")
        }
        Ok(outcome) => {
            tracing::debug!("Webhook acknowledged: {:?}", outcome);
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            tracing::error!("Webhook processing failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

use std::sync::Arc;

use storefront_core::Masked;
use storefront_order::OrderReconciler;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Masked<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<OrderReconciler>,
    pub auth: AuthConfig,
}

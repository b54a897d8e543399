use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use storefront_core::{Identity, Role};

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Option<Identity> {
        if self.sub.trim().is_empty() {
            return None;
        }
        let role = self.role.parse::<Role>().ok()?;
        Some(Identity { user_id: self.sub.clone(), role })
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Resolves the bearer token into an [`Identity`] request extension.
/// Role checks happen per operation in the reconciler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.expose().as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let identity = token_data.claims.identity().ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

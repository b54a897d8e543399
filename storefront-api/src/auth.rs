use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

use storefront_core::Role;

use crate::{error::AppError, middleware::auth::Claims};

/// Sign an HS256 bearer token accepted by [`crate::middleware::auth_middleware`].
///
/// Login lives outside this service; this is for tests and tooling.
pub fn issue_token(secret: &str, user_id: &str, role: Role, ttl_seconds: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_owned(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

//! Authentication Middleware
//! Mission: Gate admin endpoints behind bearer-token validation

use crate::auth::jwt::JwtHandler;
use crate::error::EngineError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Validates the Authorization header and attaches the caller's claims to
/// the request. Rejection here is the 401 half of the auth story; the
/// allow-list (403) is checked in the admin handlers.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, EngineError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
        .ok_or_else(|| {
            EngineError::Authentication("missing or invalid Bearer token".to_string())
        })?;

    let claims = jwt_handler
        .validate_token(&token)
        .map_err(|_| EngineError::Authentication("invalid or expired token".to_string()))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::Claims;
    use axum::{body::Body, http::Request as HttpRequest};

    #[test]
    fn test_claims_retrievable_from_extensions() {
        let mut req = HttpRequest::new(Body::empty());
        assert!(req.extensions().get::<Claims>().is_none());

        let claims = Claims {
            sub: "admin@example.com".to_string(),
            email: "admin@example.com".to_string(),
            exp: 4_102_444_800, // 2100-01-01
        };
        req.extensions_mut().insert(claims);

        let stored = req.extensions().get::<Claims>().unwrap();
        assert_eq!(stored.email, "admin@example.com");
    }
}

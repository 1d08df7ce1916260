//! JWT Token Handler
//! Mission: Validate bearer tokens and extract the caller's principal

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Claims carried by an admin session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

impl Claims {
    /// Normalized principal used against the allow-list.
    pub fn principal(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Validates tokens issued by the external auth service (shared secret).
pub struct JwtHandler {
    secret: String,
}

impl JwtHandler {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Validate a token and extract its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;

        debug!("Validated token for {}", decoded.claims.email);

        Ok(decoded.claims)
    }

    /// Mint a token for `email`. Operational tooling and tests only; the
    /// production issuer is the external auth service sharing this secret.
    pub fn issue_token(&self, email: &str, ttl_hours: i64) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::hours(ttl_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: email.to_string(),
            email: email.to_string(),
            exp: expiration,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")
    }
}

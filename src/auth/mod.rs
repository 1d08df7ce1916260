//! Authentication Module
//! Mission: Verify caller identity for the admin surface
//!
//! Tokens are only verified here, never minted for end users - session and
//! credential issuance belongs to the external auth service. The handler
//! maps a valid bearer token to an email principal; whether that principal
//! may administrate is the gateway's allow-list decision.

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtHandler};
pub use middleware::auth_middleware;

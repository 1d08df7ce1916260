//! Error taxonomy
//! Mission: One typed error surface for the round/settlement contract

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the store layer. Anything in here is considered
/// transient from the engine's point of view: the external scheduler
/// retries on the next tick and idempotency makes the retry safe.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Engine-level error taxonomy.
///
/// `Validation` and `Authorization` are terminal for the request.
/// `Conflict` from a manual lock during an automatic draw is NOT routed
/// through here - the draw reports it as a successful no-op instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("not permitted: {0}")]
    Authorization(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    TransientStore(#[from] StoreError),
    #[error("configuration error: {0}")]
    FatalConfig(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Authentication(_) => "authentication",
            EngineError::Authorization(_) => "authorization",
            EngineError::Validation(_) => "validation",
            EngineError::Conflict(_) => "conflict",
            EngineError::TransientStore(_) => "transient_store",
            EngineError::FatalConfig(_) => "fatal_config",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EngineError::Authentication(_) => StatusCode::UNAUTHORIZED,
            EngineError::Authorization(_) => StatusCode::FORBIDDEN,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::TransientStore(_) | EngineError::FatalConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "ok": false,
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            EngineError::Authentication("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            EngineError::Authorization("not an admin".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            EngineError::Validation("bad round id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::Conflict("history without force".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_response_envelope_is_not_ok() {
        let resp = EngineError::Conflict("locked".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}

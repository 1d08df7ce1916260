//! Admin Override Gateway
//! Mission: Let a verified administrator set round results without corrupting history
//!
//! The authentication middleware has already verified the bearer token by
//! the time these handlers run; what remains here is the allow-list check,
//! payload validation, the temporal editing rule, and the write itself.

use crate::{
    auth::Claims,
    clock,
    engine::{settle, SettlementSummary},
    error::EngineError,
    models::AppState,
    store::Round,
};
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SetResultRequest {
    pub game: String,
    pub round_id: String,
    pub result: Value,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct SetResultResponse {
    pub ok: bool,
    pub admin: String,
    pub saved: Round,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle: Option<SettlementSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ReopenRequest {
    pub game: String,
    pub round_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReopenResponse {
    pub ok: bool,
    pub admin: String,
    pub game: String,
    pub round_id: String,
    /// Settled bets reset to pending.
    pub reopened: u64,
}

fn require_admin(state: &AppState, claims: &Claims) -> Result<String, EngineError> {
    let principal = claims.principal();
    if !state.config.is_admin(&principal) {
        return Err(EngineError::Authorization(format!(
            "{principal} is not an administrator"
        )));
    }
    Ok(principal)
}

/// The temporal editing rule: rounds strictly before the one currently open
/// are history and require `force`.
fn ensure_editable(round_id: &str, current_round_id: &str, force: bool) -> Result<(), EngineError> {
    if round_id < current_round_id && !force {
        return Err(EngineError::Conflict(format!(
            "round {round_id} is history (current round is {current_round_id}); \
             pass force=true to rewrite it"
        )));
    }
    Ok(())
}

/// POST /api/admin/set-result
pub async fn set_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SetResultRequest>,
) -> Result<Json<SetResultResponse>, EngineError> {
    let admin = require_admin(&state, &claims)?;

    let game = state
        .games
        .get(&payload.game)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{}'", payload.game)))?;

    clock::validate_round_id(&payload.round_id, game.bucket_minutes())
        .map_err(EngineError::Validation)?;
    game.validate_result(&payload.result)
        .map_err(EngineError::Validation)?;

    let now = clock::local_now(state.config.tz_offset_minutes);
    let current = clock::round_id(now, game.bucket_minutes());
    ensure_editable(&payload.round_id, &current, payload.force)?;

    let saved = state
        .store
        .upsert_manual_round(&Round {
            game_id: game.id().to_string(),
            round_id: payload.round_id.clone(),
            result: Some(payload.result.clone()),
            is_manual: true,
            result_set_at: Some(Utc::now()),
        })
        .await?;

    info!(
        admin = %admin,
        game = game.id(),
        round = %payload.round_id,
        force = payload.force,
        "manual result set"
    );

    // Forced overrides re-settle immediately; already-settled bets are
    // skipped by the engine's idempotency guards.
    let summary = if payload.force {
        Some(settle::settle_round(state.store.as_ref(), game.as_ref(), &payload.round_id).await?)
    } else {
        None
    };

    Ok(Json(SetResultResponse {
        ok: true,
        admin,
        saved,
        settle: summary,
    }))
}

/// POST /api/admin/reopen
///
/// Resets every settled bet of a round back to pending so a forced override
/// can re-settle them. Credits already granted are NOT clawed back; a bet
/// that flips to lost keeps its old payout in the ledger, which is why this
/// path is rate-limited and loudly logged.
pub async fn reopen_round(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReopenRequest>,
) -> Result<Json<ReopenResponse>, EngineError> {
    let admin = require_admin(&state, &claims)?;

    let game = state
        .games
        .get(&payload.game)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{}'", payload.game)))?;
    clock::validate_round_id(&payload.round_id, game.bucket_minutes())
        .map_err(EngineError::Validation)?;

    let reopened = state
        .store
        .reopen_round_bets(game.id(), &payload.round_id)
        .await?;

    warn!(
        admin = %admin,
        game = game.id(),
        round = %payload.round_id,
        reopened,
        "round re-opened: settled bets reset to pending"
    );

    Ok(Json(ReopenResponse {
        ok: true,
        admin,
        game: game.id().to_string(),
        round_id: payload.round_id,
        reopened,
    }))
}

/// Router for the admin surface. Token validation is layered on top by the
/// caller; re-open additionally goes through the rate limiter.
pub fn admin_router(
    state: AppState,
    jwt: Arc<crate::auth::JwtHandler>,
    limiter: Arc<crate::middleware::RateLimiter>,
) -> axum::Router {
    use axum::{middleware, routing::post, Router};

    let reopen = Router::new()
        .route("/api/admin/reopen", post(reopen_round))
        .route_layer(middleware::from_fn_with_state(
            limiter,
            crate::middleware::rate_limit_middleware,
        ));

    Router::new()
        .route("/api/admin/set-result", post(set_result))
        .merge(reopen)
        .route_layer(middleware::from_fn_with_state(
            jwt,
            crate::auth::auth_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_requires_force() {
        let current = "202509171005";
        // Earlier round: conflict without force, accepted with it
        assert!(matches!(
            ensure_editable("202509171004", current, false),
            Err(EngineError::Conflict(_))
        ));
        assert!(ensure_editable("202509171004", current, true).is_ok());
        // The open round and future rounds never need force
        assert!(ensure_editable("202509171005", current, false).is_ok());
        assert!(ensure_editable("202509171006", current, false).is_ok());
    }
}

//! Public API routes
//! Mission: Thin request/response plumbing over the round engine
//!
//! Everything here is routine; the invariants live in the engine and the
//! store. The tick endpoint exists so an external cron can drive the engine
//! exactly like the internal scheduler loops do.

use crate::{
    clock,
    engine::{self, TickParams},
    error::EngineError,
    models::AppState,
    store::{Bet, BetPlacement, BetStatus, Round},
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/games/:game/tick", post(post_tick))
        .route("/api/games/:game/rounds/current", get(get_current_round))
        .route("/api/games/:game/rounds/:round_id", get(get_round))
        .route("/api/bets", post(post_bet))
        .route("/api/users/:user_id/balance", get(get_balance))
        .with_state(state)
}

// ===== Route Handlers =====

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub ok: bool,
    pub game: String,
    #[serde(flatten)]
    pub report: engine::TickReport,
}

/// Cron-style trigger: one idempotent engine tick for one game.
async fn post_tick(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TickResponse>, EngineError> {
    if let Some(secret) = &state.config.cron_secret {
        let presented = headers
            .get("x-cron-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != secret {
            return Err(EngineError::Authentication(
                "missing or wrong x-cron-secret".to_string(),
            ));
        }
    }

    let game = state
        .games
        .get(&game_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{game_id}'")))?;

    let params = TickParams {
        grace_secs: state.config.grace_secs,
        catchup_buckets: state.config.catchup_buckets,
        retention_days: state.config.retention_days,
    };
    let now = clock::local_now(state.config.tz_offset_minutes);
    let mut rng = StdRng::from_entropy();
    let report = engine::run_tick(state.store.as_ref(), game.as_ref(), &mut rng, now, &params)
        .await?;

    Ok(Json(TickResponse {
        ok: true,
        game: game_id,
        report,
    }))
}

#[derive(Debug, Serialize)]
pub struct CurrentRoundResponse {
    pub ok: bool,
    pub game: String,
    /// The round currently open for betting.
    pub round_id: String,
    pub closes_in_secs: i64,
    pub server_time: String,
}

async fn get_current_round(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<CurrentRoundResponse>, EngineError> {
    let game = state
        .games
        .get(&game_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{game_id}'")))?;

    let now = clock::local_now(state.config.tz_offset_minutes);
    Ok(Json(CurrentRoundResponse {
        ok: true,
        game: game_id,
        round_id: clock::round_id(now, game.bucket_minutes()),
        closes_in_secs: clock::seconds_until_close(now, game.bucket_minutes()),
        server_time: now.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RoundResponse {
    pub ok: bool,
    pub round: Option<Round>,
}

async fn get_round(
    State(state): State<AppState>,
    Path((game_id, round_id)): Path<(String, String)>,
) -> Result<Json<RoundResponse>, EngineError> {
    let game = state
        .games
        .get(&game_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{game_id}'")))?;
    clock::validate_round_id(&round_id, game.bucket_minutes()).map_err(EngineError::Validation)?;

    let round = state.store.get_round(game.id(), &round_id).await?;
    Ok(Json(RoundResponse { ok: true, round }))
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub game: String,
    pub user_id: String,
    /// Stake in currency minor units.
    pub amount: i64,
    pub selection: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceBetResponse {
    pub ok: bool,
    pub bet: Bet,
    pub balance: i64,
}

/// Place a wager against the round currently open for betting. Odds are
/// fixed server-side at placement time.
async fn post_bet(
    State(state): State<AppState>,
    Json(payload): Json<PlaceBetRequest>,
) -> Result<Json<PlaceBetResponse>, EngineError> {
    let game = state
        .games
        .get(&payload.game)
        .ok_or_else(|| EngineError::Validation(format!("unknown game '{}'", payload.game)))?;

    if payload.amount <= 0 {
        return Err(EngineError::Validation("amount must be positive".to_string()));
    }
    if payload.user_id.trim().is_empty() {
        return Err(EngineError::Validation("user_id is required".to_string()));
    }
    let odds = game.odds_for(&payload.selection).ok_or_else(|| {
        EngineError::Validation(format!(
            "'{}' is not a playable {} selection",
            payload.selection,
            game.id()
        ))
    })?;

    let now = clock::local_now(state.config.tz_offset_minutes);
    let bet = Bet {
        id: Uuid::new_v4().to_string(),
        game_id: game.id().to_string(),
        round_id: clock::round_id(now, game.bucket_minutes()),
        user_id: payload.user_id,
        amount: payload.amount,
        selection: payload.selection,
        odds,
        status: BetStatus::Pending,
        payout: 0,
        credited: false,
        settled_at: None,
        created_at: Utc::now(),
    };

    match state.store.place_bet(&bet).await? {
        BetPlacement::Accepted(bet) => {
            let balance = state.store.get_balance(&bet.user_id).await?;
            Ok(Json(PlaceBetResponse {
                ok: true,
                bet,
                balance,
            }))
        }
        BetPlacement::InsufficientFunds => Err(EngineError::Conflict(
            "insufficient balance for this stake".to_string(),
        )),
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub ok: bool,
    pub user_id: String,
    pub balance: i64,
}

async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, EngineError> {
    let balance = state.store.get_balance(&user_id).await?;
    Ok(Json(BalanceResponse {
        ok: true,
        user_id,
        balance,
    }))
}

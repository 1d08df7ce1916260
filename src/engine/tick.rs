//! Tick Orchestration
//! Mission: One idempotent unit of work per scheduler trigger
//!
//! A tick acts on the bucket that ended most recently (never one still open
//! for play), waits out a grace period after the boundary so last-moment
//! bets can land, then sweeps a few earlier buckets so a delayed or missed
//! trigger catches up instead of losing a round.

use crate::{
    clock,
    engine::{draw, retention, settle},
    error::EngineError,
    games::Game,
    store::{PurgeStats, RoundStore},
};
use chrono::{DateTime, FixedOffset};
use rand::RngCore;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TickParams {
    /// Seconds after a bucket boundary before the closed bucket is acted on.
    pub grace_secs: i64,
    /// How many buckets before the target to re-check (0 disables catch-up).
    pub catchup_buckets: u32,
    /// Retention horizon in days (0 disables purging).
    pub retention_days: i64,
}

impl Default for TickParams {
    fn default() -> Self {
        Self {
            grace_secs: 5,
            catchup_buckets: 3,
            retention_days: 7,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatchUpReport {
    pub round_id: String,
    pub draw: draw::DrawStatus,
    pub settled: u64,
}

/// What one invocation did. `TooEarly` is a successful no-op.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickReport {
    TooEarly {
        round_id: String,
        retry_in_secs: i64,
    },
    Acted {
        round_id: String,
        draw: draw::DrawStatus,
        settle: settle::SettlementSummary,
        catch_up: Vec<CatchUpReport>,
        purged: Option<PurgeStats>,
    },
}

/// Run one tick for `game` as of `now`.
///
/// Callers pass the current local time explicitly; the function itself keeps
/// no clock state, so duplicate and out-of-order invocations are harmless.
pub async fn run_tick(
    store: &dyn RoundStore,
    game: &dyn Game,
    rng: &mut (dyn RngCore + Send),
    now: DateTime<FixedOffset>,
    params: &TickParams,
) -> Result<TickReport, EngineError> {
    let width = game.bucket_minutes();
    let target = clock::closed_round_id(now, width, 1);

    let past_boundary = clock::seconds_past_boundary(now, width);
    if past_boundary < params.grace_secs {
        debug!(game = game.id(), round = %target, "too early, grace period still open");
        return Ok(TickReport::TooEarly {
            round_id: target,
            retry_in_secs: params.grace_secs - past_boundary,
        });
    }

    let (_, draw_status) = draw::ensure_result(store, game, &target, rng).await?;
    let summary = settle::settle_round(store, game, &target).await?;

    let mut catch_up = Vec::new();
    for back in 2..=params.catchup_buckets.saturating_add(1) {
        let round_id = clock::closed_round_id(now, width, back);
        let (_, draw_status) = draw::ensure_result(store, game, &round_id, rng).await?;
        let summary = settle::settle_round(store, game, &round_id).await?;
        if summary.settled > 0 || draw_status == draw::DrawStatus::Drawn {
            catch_up.push(CatchUpReport {
                round_id,
                draw: draw_status,
                settled: summary.settled,
            });
        }
    }

    let purged = retention::sweep(store, game, now, params.retention_days).await;

    Ok(TickReport::Acted {
        round_id: target,
        draw: draw_status,
        settle: summary,
        catch_up,
        purged,
    })
}

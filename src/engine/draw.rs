//! Draw Generator
//! Mission: Ensure a round has exactly one result, never trampling a manual one

use crate::{
    error::EngineError,
    games::{Game, RedrawPolicy},
    store::{Round, RoundStore, RoundWrite},
};
use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info};

/// How `ensure_result` satisfied its contract. Every variant is a success;
/// "someone already decided this round" is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    /// Fresh result inserted by this invocation.
    Drawn,
    /// Existing auto result replaced (OverwriteAuto games only).
    Redrawn,
    /// A concurrent generator inserted first; its result was read back.
    LostRace,
    /// Round already had a final result; nothing written.
    AlreadyDrawn,
    /// Manual result present; automatic generation must not touch it.
    ManualLocked,
}

/// Produce a result for `round_id` if it does not have one, honoring the
/// manual lock and the game's redraw policy. Returns the authoritative round
/// in all cases.
pub async fn ensure_result(
    store: &dyn RoundStore,
    game: &dyn Game,
    round_id: &str,
    rng: &mut (dyn RngCore + Send),
) -> Result<(Round, DrawStatus), EngineError> {
    if let Some(existing) = store.get_round(game.id(), round_id).await? {
        if existing.is_manual {
            debug!(game = game.id(), round = round_id, "manual result locked, skipping draw");
            return Ok((existing, DrawStatus::ManualLocked));
        }
        if existing.result.is_some() {
            match game.redraw_policy() {
                RedrawPolicy::KeepExisting => {
                    return Ok((existing, DrawStatus::AlreadyDrawn));
                }
                RedrawPolicy::OverwriteAuto => {
                    let candidate = draw_round(game, round_id, rng)?;
                    return match store.overwrite_auto_round(&candidate).await? {
                        RoundWrite::Applied(stored) => {
                            info!(game = game.id(), round = round_id, "auto result redrawn");
                            Ok((stored, DrawStatus::Redrawn))
                        }
                        // Lost to a manual write or to settlement freezing
                        // the result; the stored row stands.
                        RoundWrite::Conflict(stored) => {
                            let status = if stored.is_manual {
                                DrawStatus::ManualLocked
                            } else {
                                DrawStatus::AlreadyDrawn
                            };
                            Ok((stored, status))
                        }
                    };
                }
            }
        }
    }

    let candidate = draw_round(game, round_id, rng)?;
    match store.insert_round_if_absent(&candidate).await? {
        RoundWrite::Applied(stored) => {
            info!(
                game = game.id(),
                round = round_id,
                result = %stored.result.as_ref().map(|r| r.to_string()).unwrap_or_default(),
                "result drawn"
            );
            Ok((stored, DrawStatus::Drawn))
        }
        RoundWrite::Conflict(stored) => {
            let status = if stored.is_manual {
                DrawStatus::ManualLocked
            } else {
                DrawStatus::LostRace
            };
            debug!(game = game.id(), round = round_id, ?status, "draw conflict, using stored result");
            Ok((stored, status))
        }
    }
}

fn draw_round(
    game: &dyn Game,
    round_id: &str,
    rng: &mut (dyn RngCore + Send),
) -> Result<Round, EngineError> {
    let result = game
        .draw(rng)
        .map_err(|e| EngineError::Validation(format!("{} draw rejected: {e}", game.id())))?;
    Ok(Round {
        game_id: game.id().to_string(),
        round_id: round_id.to_string(),
        result: Some(result),
        is_manual: false,
        result_set_at: Some(Utc::now()),
    })
}

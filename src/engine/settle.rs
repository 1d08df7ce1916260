//! Settlement Engine
//! Mission: Resolve every bet against a finalized result, credit winners exactly once
//!
//! Safe under duplicate and overlapping invocations: the pending scan is the
//! idempotency guard, the per-bet compare-and-set closes the double-settle
//! race, and balance credits carry per-bet idempotency keys so any retry
//! re-applies only what the ledger has not seen.

use crate::{
    error::EngineError,
    games::Game,
    store::{BetStatus, CreditRequest, RoundStore},
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SettlementSummary {
    /// Bets this invocation moved out of `pending`.
    pub settled: u64,
    pub won: u64,
    pub lost: u64,
    /// Minor units newly applied to balances (this invocation).
    pub credited_amount: i64,
    /// Users whose credit failed and will be retried next tick.
    pub credit_failures: u64,
}

/// Payout in minor units for a winning bet.
pub fn payout_amount(amount: i64, odds: f64) -> i64 {
    (amount as f64 * odds).round() as i64
}

/// Settle every pending bet of `round_id` and credit winners.
///
/// Returns zero settled when the round has no result yet or nothing is
/// pending; both are normal outcomes, the caller may simply retry later.
pub async fn settle_round(
    store: &dyn RoundStore,
    game: &dyn Game,
    round_id: &str,
) -> Result<SettlementSummary, EngineError> {
    let mut summary = SettlementSummary::default();

    let Some(round) = store.get_round(game.id(), round_id).await? else {
        return Ok(summary);
    };
    let Some(result) = round.result.as_ref() else {
        return Ok(summary);
    };

    let pending = store.list_pending_bets(game.id(), round_id).await?;
    let settled_at = Utc::now();
    for bet in &pending {
        let win = game.wins(&bet.selection, result);
        let (status, payout) = if win {
            (BetStatus::Won, payout_amount(bet.amount, bet.odds))
        } else {
            (BetStatus::Lost, 0)
        };
        // Losers have nothing outstanding to credit; winners stay
        // uncredited until the ledger confirms.
        let updated = store
            .settle_bet_if_pending(&bet.id, status, payout, !win, settled_at)
            .await?;
        if !updated {
            // An overlapping run settled this bet first; it also owns the
            // credit, so this one is simply not ours to count.
            continue;
        }
        summary.settled += 1;
        if win {
            summary.won += 1;
        } else {
            summary.lost += 1;
        }
    }

    // Credit phase. The scan also picks up wins from earlier invocations
    // that crashed between settling and crediting.
    let uncredited = store.list_uncredited_wins(game.id(), round_id).await?;
    let mut by_user: BTreeMap<String, Vec<(String, i64)>> = BTreeMap::new();
    for bet in uncredited {
        by_user
            .entry(bet.user_id.clone())
            .or_default()
            .push((bet.id, bet.payout));
    }

    for (user_id, wins) in by_user {
        let credits: Vec<CreditRequest> = wins
            .iter()
            .map(|(bet_id, payout)| CreditRequest {
                idempotency_key: format!("credit:{bet_id}"),
                amount: *payout,
            })
            .collect();

        match store.credit_user_balance(&user_id, &credits).await {
            Ok(applied) => {
                summary.credited_amount += applied;
                let bet_ids: Vec<String> = wins.into_iter().map(|(id, _)| id).collect();
                if let Err(e) = store.mark_bets_credited(&bet_ids).await {
                    // The ledger already holds the keys; the next scan
                    // re-sends them, applies nothing, and re-marks.
                    warn!(user = %user_id, error = %e, "failed to mark bets credited");
                }
            }
            Err(e) => {
                warn!(
                    game = game.id(),
                    round = round_id,
                    user = %user_id,
                    error = %e,
                    "balance credit failed; will retry on next tick"
                );
                summary.credit_failures += 1;
            }
        }
    }

    if summary.settled > 0 {
        info!(
            game = game.id(),
            round = round_id,
            settled = summary.settled,
            won = summary.won,
            credited = summary.credited_amount,
            "round settled"
        );
    }
    Ok(summary)
}

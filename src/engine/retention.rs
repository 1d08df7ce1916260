//! Retention Sweeper
//! Mission: Best-effort pruning of rounds and bets past the retention horizon
//!
//! Housekeeping only. Failures are logged and swallowed; they must never
//! fail the invocation that carried them.

use crate::{clock, games::Game, store::{PurgeStats, RoundStore}};
use chrono::{DateTime, Duration, FixedOffset};
use tracing::{debug, warn};

/// Purge rounds and bets older than `retention_days` before `now`.
/// Returns `None` when retention is disabled or the sweep failed.
pub async fn sweep(
    store: &dyn RoundStore,
    game: &dyn Game,
    now: DateTime<FixedOffset>,
    retention_days: i64,
) -> Option<PurgeStats> {
    if retention_days <= 0 {
        return None;
    }

    let threshold = clock::round_id(now - Duration::days(retention_days), game.bucket_minutes());
    match store.purge_before(game.id(), &threshold).await {
        Ok(stats) => {
            if stats.rounds > 0 || stats.bets > 0 {
                debug!(
                    game = game.id(),
                    threshold = %threshold,
                    rounds = stats.rounds,
                    bets = stats.bets,
                    "retention sweep purged old records"
                );
            }
            Some(stats)
        }
        Err(e) => {
            warn!(game = game.id(), error = %e, "retention sweep failed; continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::ColorGame;
    use crate::store::{Round, SqliteRoundStore};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_sweep_purges_only_past_horizon() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteRoundStore::new(temp_file.path().to_str().unwrap()).unwrap();

        let now = FixedOffset::east_opt(330 * 60)
            .unwrap()
            .with_ymd_and_hms(2025, 9, 17, 10, 5, 0)
            .unwrap();

        for round_id in ["202509011000", "202509161004", "202509171002"] {
            store
                .insert_round_if_absent(&Round {
                    game_id: "color".to_string(),
                    round_id: round_id.to_string(),
                    result: Some(json!({"number": 0, "color": "red"})),
                    is_manual: false,
                    result_set_at: Some(Utc.timestamp_opt(0, 0).unwrap()),
                })
                .await
                .unwrap();
        }

        // 7-day horizon: only the September 1st round is past it
        let stats = sweep(&store, &ColorGame, now, 7).await.unwrap();
        assert_eq!(stats.rounds, 1);
        assert!(store.get_round("color", "202509011000").await.unwrap().is_none());
        assert!(store.get_round("color", "202509161004").await.unwrap().is_some());

        // Disabled retention is a no-op
        assert!(sweep(&store, &ColorGame, now, 0).await.is_none());
    }
}

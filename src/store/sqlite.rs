//! SQLite round store
//! Mission: Durable rounds, bets and ledger with conditional-write semantics
//!
//! Single-file database in WAL mode behind an async mutex, the same shape the
//! rest of the stack uses for durable state. Every engine-facing guarantee
//! (first-writer-wins draws, at-most-once settlement, idempotent credits)
//! maps to one conditional statement here.

use super::{
    Bet, BetPlacement, BetStatus, CreditRequest, PurgeStats, Round, RoundStore, RoundWrite,
};
use crate::error::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SqliteRoundStore {
    conn: Arc<Mutex<Connection>>,
}

fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn round_from_row(row: &Row) -> rusqlite::Result<Round> {
    let result: Option<String> = row.get(2)?;
    Ok(Round {
        game_id: row.get(0)?,
        round_id: row.get(1)?,
        result: result.and_then(|s| serde_json::from_str(&s).ok()),
        is_manual: row.get::<_, i64>(3)? != 0,
        result_set_at: parse_ts(row.get(4)?),
    })
}

const BET_COLUMNS: &str =
    "id, game_id, round_id, user_id, amount, selection, odds, status, payout, credited, settled_at, created_at";

fn bet_from_row(row: &Row) -> rusqlite::Result<Bet> {
    let status: String = row.get(7)?;
    Ok(Bet {
        id: row.get(0)?,
        game_id: row.get(1)?,
        round_id: row.get(2)?,
        user_id: row.get(3)?,
        amount: row.get(4)?,
        selection: row.get(5)?,
        odds: row.get(6)?,
        status: BetStatus::from_str(&status).unwrap_or(BetStatus::Pending),
        payout: row.get(8)?,
        credited: row.get::<_, i64>(9)? != 0,
        settled_at: parse_ts(row.get(10)?),
        created_at: parse_ts(row.get(11)?).unwrap_or_else(Utc::now),
    })
}

impl SqliteRoundStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open round store db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                game_id TEXT NOT NULL,
                round_id TEXT NOT NULL,
                result TEXT,
                is_manual INTEGER NOT NULL DEFAULT 0,
                redrawn INTEGER NOT NULL DEFAULT 0,
                result_set_at TEXT,
                PRIMARY KEY (game_id, round_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                game_id TEXT NOT NULL,
                round_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                selection TEXT NOT NULL,
                odds REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                payout INTEGER NOT NULL DEFAULT 0,
                credited INTEGER NOT NULL DEFAULT 0,
                settled_at TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bets_round_status
             ON bets(game_id, round_id, status)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS credit_ledger (
                idempotency_key TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn read_round(
        &self,
        conn: &Connection,
        game_id: &str,
        round_id: &str,
    ) -> Result<Option<Round>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT game_id, round_id, result, is_manual, result_set_at
             FROM rounds WHERE game_id = ?1 AND round_id = ?2",
        )?;
        match stmt.query_row(params![game_id, round_id], round_from_row) {
            Ok(round) => Ok(Some(round)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RoundStore for SqliteRoundStore {
    async fn get_round(&self, game_id: &str, round_id: &str) -> Result<Option<Round>, StoreError> {
        let conn = self.conn.lock().await;
        self.read_round(&conn, game_id, round_id)
    }

    async fn insert_round_if_absent(&self, round: &Round) -> Result<RoundWrite, StoreError> {
        let conn = self.conn.lock().await;
        let result_json = round.result.as_ref().map(|v| v.to_string());
        let changed = conn.execute(
            "INSERT INTO rounds (game_id, round_id, result, is_manual, result_set_at)
             VALUES (?1, ?2, ?3, 0, ?4)
             ON CONFLICT(game_id, round_id) DO UPDATE SET
                 result = excluded.result,
                 result_set_at = excluded.result_set_at
             WHERE rounds.result IS NULL AND rounds.is_manual = 0",
            params![
                round.game_id,
                round.round_id,
                result_json,
                round.result_set_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        let stored = self
            .read_round(&conn, &round.game_id, &round.round_id)?
            .ok_or_else(|| StoreError::Unavailable("round vanished after upsert".into()))?;
        if changed > 0 {
            Ok(RoundWrite::Applied(stored))
        } else {
            Ok(RoundWrite::Conflict(stored))
        }
    }

    async fn overwrite_auto_round(&self, round: &Round) -> Result<RoundWrite, StoreError> {
        let conn = self.conn.lock().await;
        let result_json = round.result.as_ref().map(|v| v.to_string());
        // At most one automatic overwrite per round, and a result any bet
        // has consumed is frozen.
        let changed = conn.execute(
            "UPDATE rounds SET result = ?3, result_set_at = ?4, redrawn = 1
             WHERE game_id = ?1 AND round_id = ?2 AND is_manual = 0 AND redrawn = 0
               AND NOT EXISTS (
                   SELECT 1 FROM bets
                   WHERE bets.game_id = ?1 AND bets.round_id = ?2
                     AND bets.status != 'pending'
               )",
            params![
                round.game_id,
                round.round_id,
                result_json,
                round.result_set_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        match self
            .read_round(&conn, &round.game_id, &round.round_id)?
        {
            Some(stored) if changed > 0 => Ok(RoundWrite::Applied(stored)),
            Some(stored) => Ok(RoundWrite::Conflict(stored)),
            None => {
                drop(conn);
                self.insert_round_if_absent(round).await
            }
        }
    }

    async fn upsert_manual_round(&self, round: &Round) -> Result<Round, StoreError> {
        let conn = self.conn.lock().await;
        let result_json = round.result.as_ref().map(|v| v.to_string());
        conn.execute(
            "INSERT INTO rounds (game_id, round_id, result, is_manual, result_set_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(game_id, round_id) DO UPDATE SET
                 result = excluded.result,
                 is_manual = 1,
                 result_set_at = excluded.result_set_at",
            params![
                round.game_id,
                round.round_id,
                result_json,
                round.result_set_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        self.read_round(&conn, &round.game_id, &round.round_id)?
            .ok_or_else(|| StoreError::Unavailable("round vanished after manual upsert".into()))
    }

    async fn list_pending_bets(
        &self,
        game_id: &str,
        round_id: &str,
    ) -> Result<Vec<Bet>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE game_id = ?1 AND round_id = ?2 AND status = 'pending'"
        ))?;
        let bets = stmt
            .query_map(params![game_id, round_id], bet_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bets)
    }

    async fn list_uncredited_wins(
        &self,
        game_id: &str,
        round_id: &str,
    ) -> Result<Vec<Bet>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE game_id = ?1 AND round_id = ?2 AND status = 'won' AND credited = 0"
        ))?;
        let bets = stmt
            .query_map(params![game_id, round_id], bet_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bets)
    }

    async fn settle_bet_if_pending(
        &self,
        bet_id: &str,
        status: BetStatus,
        payout: i64,
        credited: bool,
        settled_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE bets SET status = ?2, payout = ?3, credited = ?4, settled_at = ?5
             WHERE id = ?1 AND status = 'pending'",
            params![
                bet_id,
                status.as_str(),
                payout,
                credited as i64,
                settled_at.to_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    }

    async fn credit_user_balance(
        &self,
        user_id: &str,
        credits: &[CreditRequest],
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut applied: i64 = 0;
        for credit in credits {
            let fresh = tx.execute(
                "INSERT OR IGNORE INTO credit_ledger (idempotency_key, user_id, amount, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![credit.idempotency_key, user_id, credit.amount, now],
            )?;
            if fresh == 1 {
                applied += credit.amount;
            }
        }

        if applied != 0 {
            tx.execute(
                "INSERT INTO balances (user_id, balance, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     balance = balance + excluded.balance,
                     updated_at = excluded.updated_at",
                params![user_id, applied, now],
            )?;
        }

        tx.commit()?;
        Ok(applied)
    }

    async fn mark_bets_credited(&self, bet_ids: &[String]) -> Result<(), StoreError> {
        if bet_ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let placeholders = vec!["?"; bet_ids.len()].join(", ");
        conn.execute(
            &format!("UPDATE bets SET credited = 1 WHERE id IN ({placeholders})"),
            params_from_iter(bet_ids.iter()),
        )?;
        Ok(())
    }

    async fn reopen_round_bets(&self, game_id: &str, round_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE bets
             SET status = 'pending', payout = 0, credited = 0, settled_at = NULL
             WHERE game_id = ?1 AND round_id = ?2 AND status != 'pending'",
            params![game_id, round_id],
        )?;
        Ok(changed as u64)
    }

    async fn purge_before(
        &self,
        game_id: &str,
        threshold_round_id: &str,
    ) -> Result<PurgeStats, StoreError> {
        let conn = self.conn.lock().await;
        let bets = conn.execute(
            "DELETE FROM bets WHERE game_id = ?1 AND round_id < ?2",
            params![game_id, threshold_round_id],
        )?;
        let rounds = conn.execute(
            "DELETE FROM rounds WHERE game_id = ?1 AND round_id < ?2",
            params![game_id, threshold_round_id],
        )?;
        Ok(PurgeStats {
            rounds: rounds as u64,
            bets: bets as u64,
        })
    }

    async fn place_bet(&self, bet: &Bet) -> Result<BetPlacement, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let debited = tx.execute(
            "UPDATE balances SET balance = balance - ?2, updated_at = ?3
             WHERE user_id = ?1 AND balance >= ?2",
            params![bet.user_id, bet.amount, Utc::now().to_rfc3339()],
        )?;
        if debited == 0 {
            return Ok(BetPlacement::InsufficientFunds);
        }

        tx.execute(
            &format!(
                "INSERT INTO bets ({BET_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                bet.id,
                bet.game_id,
                bet.round_id,
                bet.user_id,
                bet.amount,
                bet.selection,
                bet.odds,
                bet.status.as_str(),
                bet.payout,
                bet.credited as i64,
                bet.settled_at.map(|t| t.to_rfc3339()),
                bet.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(BetPlacement::Accepted(bet.clone()))
    }

    async fn get_balance(&self, user_id: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        let balance = conn
            .query_row(
                "SELECT balance FROM balances WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(0),
                other => Err(other),
            })?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn create_test_store() -> (SqliteRoundStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteRoundStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    fn auto_round(round_id: &str, result: serde_json::Value) -> Round {
        Round {
            game_id: "color".to_string(),
            round_id: round_id.to_string(),
            result: Some(result),
            is_manual: false,
            result_set_at: Some(Utc::now()),
        }
    }

    fn pending_bet(round_id: &str, user_id: &str, amount: i64) -> Bet {
        Bet {
            id: Uuid::new_v4().to_string(),
            game_id: "color".to_string(),
            round_id: round_id.to_string(),
            user_id: user_id.to_string(),
            amount,
            selection: "red".to_string(),
            odds: 9.0,
            status: BetStatus::Pending,
            payout: 0,
            credited: false,
            settled_at: None,
            created_at: Utc::now(),
        }
    }

    async fn seed_balance(store: &SqliteRoundStore, user_id: &str, amount: i64) {
        let applied = store
            .credit_user_balance(
                user_id,
                &[CreditRequest {
                    idempotency_key: format!("seed:{user_id}"),
                    amount,
                }],
            )
            .await
            .unwrap();
        assert_eq!(applied, amount);
    }

    #[tokio::test]
    async fn test_first_insert_wins() {
        let (store, _temp) = create_test_store();

        let first = auto_round("202509171004", json!({"number": 1, "color": "green"}));
        let second = auto_round("202509171004", json!({"number": 5, "color": "pink"}));

        assert!(matches!(
            store.insert_round_if_absent(&first).await.unwrap(),
            RoundWrite::Applied(_)
        ));
        match store.insert_round_if_absent(&second).await.unwrap() {
            RoundWrite::Conflict(winner) => {
                assert_eq!(winner.result, first.result);
                assert!(!winner.is_manual);
            }
            RoundWrite::Applied(_) => panic!("second insert must lose"),
        }
    }

    #[tokio::test]
    async fn test_manual_round_locks_out_auto_insert() {
        let (store, _temp) = create_test_store();

        let mut manual = auto_round("202509171004", json!({"number": 3, "color": "purple"}));
        manual.is_manual = true;
        store.upsert_manual_round(&manual).await.unwrap();

        let auto = auto_round("202509171004", json!({"number": 8, "color": "black"}));
        match store.insert_round_if_absent(&auto).await.unwrap() {
            RoundWrite::Conflict(winner) => {
                assert!(winner.is_manual);
                assert_eq!(winner.result, manual.result);
            }
            RoundWrite::Applied(_) => panic!("auto insert must not overwrite a manual result"),
        }
    }

    #[tokio::test]
    async fn test_overwrite_auto_happens_at_most_once() {
        let (store, _temp) = create_test_store();

        let original = auto_round("202509171004", json!({"number": 1, "color": "green"}));
        store.insert_round_if_absent(&original).await.unwrap();

        // Plain auto result: the single allowed overwrite applies
        let replacement = auto_round("202509171004", json!({"number": 2, "color": "blue"}));
        assert!(matches!(
            store.overwrite_auto_round(&replacement).await.unwrap(),
            RoundWrite::Applied(_)
        ));

        // The overwrite budget is spent
        let third = auto_round("202509171004", json!({"number": 9, "color": "white"}));
        match store.overwrite_auto_round(&third).await.unwrap() {
            RoundWrite::Conflict(stored) => assert_eq!(stored.result, replacement.result),
            RoundWrite::Applied(_) => panic!("only one automatic overwrite is allowed"),
        }
    }

    #[tokio::test]
    async fn test_overwrite_auto_respects_manual_and_settled() {
        let (store, _temp) = create_test_store();

        // Once a bet has been settled against it, the result is frozen even
        // though no overwrite has happened yet
        let original = auto_round("202509171004", json!({"number": 1, "color": "green"}));
        store.insert_round_if_absent(&original).await.unwrap();
        seed_balance(&store, "u1", 1_000).await;
        let bet = pending_bet("202509171004", "u1", 100);
        store.place_bet(&bet).await.unwrap();
        store
            .settle_bet_if_pending(&bet.id, BetStatus::Lost, 0, true, Utc::now())
            .await
            .unwrap();
        let late = auto_round("202509171004", json!({"number": 9, "color": "white"}));
        assert!(matches!(
            store.overwrite_auto_round(&late).await.unwrap(),
            RoundWrite::Conflict(_)
        ));

        // Manual rounds are never overwritten
        let mut manual = auto_round("202509171006", json!({"number": 3, "color": "purple"}));
        manual.is_manual = true;
        store.upsert_manual_round(&manual).await.unwrap();
        let auto = auto_round("202509171006", json!({"number": 4, "color": "yellow"}));
        assert!(matches!(
            store.overwrite_auto_round(&auto).await.unwrap(),
            RoundWrite::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_settle_bet_compare_and_set() {
        let (store, _temp) = create_test_store();
        seed_balance(&store, "u1", 1_000).await;

        let bet = pending_bet("202509171004", "u1", 100);
        store.place_bet(&bet).await.unwrap();

        let now = Utc::now();
        assert!(store
            .settle_bet_if_pending(&bet.id, BetStatus::Won, 900, false, now)
            .await
            .unwrap());
        // Second settlement attempt observes the bet already changed
        assert!(!store
            .settle_bet_if_pending(&bet.id, BetStatus::Lost, 0, true, now)
            .await
            .unwrap());

        let wins = store.list_uncredited_wins("color", "202509171004").await.unwrap();
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].payout, 900);
        assert_eq!(wins[0].status, BetStatus::Won);
        assert!(wins[0].settled_at.is_some());
    }

    #[tokio::test]
    async fn test_credit_is_idempotent_per_key() {
        let (store, _temp) = create_test_store();

        let credits = [
            CreditRequest {
                idempotency_key: "credit:a".to_string(),
                amount: 195,
            },
            CreditRequest {
                idempotency_key: "credit:b".to_string(),
                amount: 900,
            },
        ];
        assert_eq!(store.credit_user_balance("u1", &credits).await.unwrap(), 1_095);
        // Full retry applies nothing
        assert_eq!(store.credit_user_balance("u1", &credits).await.unwrap(), 0);
        // Partial retry applies only the unseen key
        let mixed = [
            CreditRequest {
                idempotency_key: "credit:b".to_string(),
                amount: 900,
            },
            CreditRequest {
                idempotency_key: "credit:c".to_string(),
                amount: 50,
            },
        ];
        assert_eq!(store.credit_user_balance("u1", &mixed).await.unwrap(), 50);
        assert_eq!(store.get_balance("u1").await.unwrap(), 1_145);
    }

    #[tokio::test]
    async fn test_place_bet_debits_stake() {
        let (store, _temp) = create_test_store();
        seed_balance(&store, "u1", 150).await;

        let bet = pending_bet("202509171004", "u1", 100);
        assert!(matches!(
            store.place_bet(&bet).await.unwrap(),
            BetPlacement::Accepted(_)
        ));
        assert_eq!(store.get_balance("u1").await.unwrap(), 50);

        // Not enough left for a second 100 stake
        let bet2 = pending_bet("202509171004", "u1", 100);
        assert!(matches!(
            store.place_bet(&bet2).await.unwrap(),
            BetPlacement::InsufficientFunds
        ));
        assert_eq!(store.get_balance("u1").await.unwrap(), 50);
        // Unknown users have no funds
        let bet3 = pending_bet("202509171004", "ghost", 10);
        assert!(matches!(
            store.place_bet(&bet3).await.unwrap(),
            BetPlacement::InsufficientFunds
        ));
    }

    #[tokio::test]
    async fn test_reopen_resets_settled_bets() {
        let (store, _temp) = create_test_store();
        seed_balance(&store, "u1", 1_000).await;

        let bet = pending_bet("202509171004", "u1", 100);
        store.place_bet(&bet).await.unwrap();
        store
            .settle_bet_if_pending(&bet.id, BetStatus::Won, 900, true, Utc::now())
            .await
            .unwrap();

        assert_eq!(store.reopen_round_bets("color", "202509171004").await.unwrap(), 1);
        let pending = store.list_pending_bets("color", "202509171004").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payout, 0);
        assert!(pending[0].settled_at.is_none());
        // Nothing left to reopen
        assert_eq!(store.reopen_round_bets("color", "202509171004").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_deletes_strictly_older() {
        let (store, _temp) = create_test_store();
        seed_balance(&store, "u1", 1_000).await;

        for round_id in ["202509161000", "202509171000", "202509171004"] {
            let round = auto_round(round_id, json!({"number": 1, "color": "green"}));
            store.insert_round_if_absent(&round).await.unwrap();
            store.place_bet(&pending_bet(round_id, "u1", 10)).await.unwrap();
        }

        let stats = store.purge_before("color", "202509171004").await.unwrap();
        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.bets, 2);

        assert!(store.get_round("color", "202509161000").await.unwrap().is_none());
        assert!(store.get_round("color", "202509171004").await.unwrap().is_some());
    }
}

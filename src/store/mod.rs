//! Round Store
//! Mission: The one shared mutable resource, behind conditional-write primitives
//!
//! The engine holds no authoritative state between invocations; every
//! coordination point (draw races, duplicate settlement, balance credits)
//! is a conditional write implemented by the store. The SQLite adapter in
//! [`sqlite`] is the production implementation.

pub mod sqlite;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use sqlite::SqliteRoundStore;

/// One time bucket of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub game_id: String,
    pub round_id: String,
    /// Game-specific payload; opaque to settlement beyond presence.
    pub result: Option<Value>,
    /// Once true, no automatic process may overwrite `result`.
    pub is_manual: bool,
    pub result_set_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BetStatus::Pending),
            "won" => Some(BetStatus::Won),
            "lost" => Some(BetStatus::Lost),
            _ => None,
        }
    }
}

/// A wager against one round. Amounts are currency minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub game_id: String,
    pub round_id: String,
    pub user_id: String,
    pub amount: i64,
    pub selection: String,
    pub odds: f64,
    pub status: BetStatus,
    pub payout: i64,
    /// False only for a won bet whose balance credit has not been confirmed.
    pub credited: bool,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a conditional round write. `Conflict` carries the row that won
/// instead - callers read it back rather than erroring.
#[derive(Debug, Clone)]
pub enum RoundWrite {
    Applied(Round),
    Conflict(Round),
}

/// One idempotent balance credit. Keys are per bet (`credit:{bet_id}`), so a
/// retried batch re-applies only what the ledger has not seen.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub idempotency_key: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PurgeStats {
    pub rounds: u64,
    pub bets: u64,
}

#[derive(Debug, Clone)]
pub enum BetPlacement {
    Accepted(Bet),
    InsufficientFunds,
}

#[async_trait]
pub trait RoundStore: Send + Sync {
    async fn get_round(&self, game_id: &str, round_id: &str) -> Result<Option<Round>, StoreError>;

    /// Conditional insert: writes the round only if no result exists yet.
    /// Two concurrent generators converge on one winner; the loser receives
    /// `Conflict` with the winning row.
    async fn insert_round_if_absent(&self, round: &Round) -> Result<RoundWrite, StoreError>;

    /// Overwrite an existing automatic result. Refuses (`Conflict`) if the
    /// round is manual or any of its bets has already left `pending` - a
    /// consumed result is frozen.
    async fn overwrite_auto_round(&self, round: &Round) -> Result<RoundWrite, StoreError>;

    /// Administrator write: upserts the round with `is_manual = true`.
    async fn upsert_manual_round(&self, round: &Round) -> Result<Round, StoreError>;

    async fn list_pending_bets(&self, game_id: &str, round_id: &str)
        -> Result<Vec<Bet>, StoreError>;

    /// Won bets whose balance credit is still outstanding.
    async fn list_uncredited_wins(
        &self,
        game_id: &str,
        round_id: &str,
    ) -> Result<Vec<Bet>, StoreError>;

    /// Compare-and-set: settles the bet only if it is still `pending`.
    /// Returns false when another invocation settled it first.
    async fn settle_bet_if_pending(
        &self,
        bet_id: &str,
        status: BetStatus,
        payout: i64,
        credited: bool,
        settled_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Atomically apply every credit whose idempotency key is unseen and
    /// increment the user's balance by their sum. Returns the amount that
    /// was actually applied (0 when all keys were already spent).
    async fn credit_user_balance(
        &self,
        user_id: &str,
        credits: &[CreditRequest],
    ) -> Result<i64, StoreError>;

    async fn mark_bets_credited(&self, bet_ids: &[String]) -> Result<(), StoreError>;

    /// Reset every settled bet of a round back to `pending`. Dangerous;
    /// exposed only through the rate-limited admin re-open path.
    async fn reopen_round_bets(&self, game_id: &str, round_id: &str) -> Result<u64, StoreError>;

    /// Delete rounds and bets sorting strictly before `threshold_round_id`.
    async fn purge_before(
        &self,
        game_id: &str,
        threshold_round_id: &str,
    ) -> Result<PurgeStats, StoreError>;

    /// Atomically debit the stake and insert a pending bet.
    async fn place_bet(&self, bet: &Bet) -> Result<BetPlacement, StoreError>;

    async fn get_balance(&self, user_id: &str) -> Result<i64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_status_round_trip() {
        for status in [BetStatus::Pending, BetStatus::Won, BetStatus::Lost] {
            assert_eq!(BetStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BetStatus::from_str("void"), None);
    }
}

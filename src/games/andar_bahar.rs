//! Andar Bahar (1-minute rounds)
//!
//! Result: the lead card's rank, the winning side, and the position of the
//! matching card. The match index is drawn from a center-weighted candidate
//! list so mid-deck matches stay the common case.

use super::Game;
use anyhow::Result;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

pub const RANKS: [&str; 13] = [
    "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
];

/// Positions 5-12 dominate, weighted toward the middle.
const MATCH_INDEX_CANDIDATES: [u32; 14] = [5, 6, 6, 7, 7, 7, 8, 8, 8, 9, 9, 10, 11, 12];

const DEFAULT_ODDS: f64 = 1.95;

pub struct AndarBahar;

impl Game for AndarBahar {
    fn id(&self) -> &'static str {
        "andar_bahar"
    }

    fn bucket_minutes(&self) -> u32 {
        1
    }

    fn draw(&self, rng: &mut dyn RngCore) -> Result<Value> {
        let lead_rank = RANKS[rng.gen_range(0..RANKS.len())];
        let side = if rng.gen_bool(0.5) { "andar" } else { "bahar" };
        let match_index = MATCH_INDEX_CANDIDATES[rng.gen_range(0..MATCH_INDEX_CANDIDATES.len())];
        Ok(json!({
            "lead_rank": lead_rank,
            "side": side,
            "match_index": match_index,
        }))
    }

    fn validate_result(&self, result: &Value) -> Result<(), String> {
        let side = result
            .get("side")
            .and_then(Value::as_str)
            .ok_or("side must be 'andar' or 'bahar'")?;
        if side != "andar" && side != "bahar" {
            return Err(format!("side '{side}' must be 'andar' or 'bahar'"));
        }
        let rank = result
            .get("lead_rank")
            .and_then(Value::as_str)
            .ok_or("lead_rank is required")?;
        if !RANKS.contains(&rank) {
            return Err(format!("lead_rank '{rank}' is not a card rank"));
        }
        if let Some(index) = result.get("match_index") {
            let valid = index.as_u64().map(|i| (1..=49).contains(&i)).unwrap_or(false);
            if !valid {
                return Err("match_index must be an integer between 1 and 49".to_string());
            }
        }
        Ok(())
    }

    fn wins(&self, selection: &str, result: &Value) -> bool {
        result
            .get("side")
            .and_then(Value::as_str)
            .map(|side| side == selection)
            .unwrap_or(false)
    }

    fn odds_for(&self, selection: &str) -> Option<f64> {
        matches!(selection, "andar" | "bahar").then_some(DEFAULT_ODDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_draw_stays_in_outcome_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let value = AndarBahar.draw(&mut rng).unwrap();
            assert!(AndarBahar.validate_result(&value).is_ok());
            let index = value["match_index"].as_u64().unwrap() as u32;
            assert!(MATCH_INDEX_CANDIDATES.contains(&index));
        }
    }

    #[test]
    fn test_side_resolution() {
        let value = json!({ "lead_rank": "K", "side": "andar", "match_index": 7 });
        assert!(AndarBahar.wins("andar", &value));
        assert!(!AndarBahar.wins("bahar", &value));
        assert!(!AndarBahar.wins("tie", &value));
    }

    #[test]
    fn test_validate_rejects_bad_payloads() {
        assert!(AndarBahar
            .validate_result(&json!({ "lead_rank": "K", "side": "left" }))
            .is_err());
        assert!(AndarBahar
            .validate_result(&json!({ "lead_rank": "11", "side": "andar" }))
            .is_err());
        assert!(AndarBahar
            .validate_result(&json!({ "lead_rank": "K", "side": "andar", "match_index": 0 }))
            .is_err());
        // match_index is optional for manual results
        assert!(AndarBahar
            .validate_result(&json!({ "lead_rank": "K", "side": "bahar" }))
            .is_ok());
    }

    #[test]
    fn test_odds() {
        assert_eq!(AndarBahar.odds_for("andar"), Some(1.95));
        assert_eq!(AndarBahar.odds_for("bahar"), Some(1.95));
        assert_eq!(AndarBahar.odds_for("K"), None);
    }
}

//! Multiplier wheel (2-minute rounds)
//!
//! Result: a wheel index 1-14 mapped to a number 4-17 (number = index + 3)
//! with a fixed payout multiplier per number. Indexes 0 and 15 (numbers 3
//! and 18) are excluded from play. Unlike the other games, an unsettled
//! auto result may be overwritten by a later automatic draw.

use super::{Game, RedrawPolicy};
use anyhow::{bail, Result};
use rand::{Rng, RngCore};
use serde_json::{json, Value};

pub struct WheelGame;

const MIN_INDEX: u64 = 1;
const MAX_INDEX: u64 = 14;

/// Payout multiplier per wheel number. Covers the full 3-18 face even though
/// 3 and 18 never come up, so manual validation has one source of truth.
pub fn multiplier_for(number: u64) -> Option<f64> {
    let multiplier = match number {
        3 | 18 => 180.0,
        4 | 17 => 60.0,
        5 | 16 => 30.0,
        6 | 15 => 18.0,
        7 | 14 => 12.0,
        8 | 13 => 9.0,
        9 | 12 => 8.0,
        10 | 11 => 7.0,
        _ => return None,
    };
    Some(multiplier)
}

impl Game for WheelGame {
    fn id(&self) -> &'static str {
        "wheel"
    }

    fn bucket_minutes(&self) -> u32 {
        2
    }

    fn redraw_policy(&self) -> RedrawPolicy {
        RedrawPolicy::OverwriteAuto
    }

    fn draw(&self, rng: &mut dyn RngCore) -> Result<Value> {
        let index = rng.gen_range(MIN_INDEX..=MAX_INDEX);
        let number = index + 3;

        // Guards mirror the outcome-set invariant: abort before any write.
        if !(MIN_INDEX..=MAX_INDEX).contains(&index) {
            bail!("forbidden wheel index {index}");
        }
        let Some(multiplier) = multiplier_for(number) else {
            bail!("missing multiplier for wheel number {number}");
        };

        Ok(json!({
            "index": index,
            "number": number,
            "multiplier": multiplier,
        }))
    }

    fn validate_result(&self, result: &Value) -> Result<(), String> {
        let index = result
            .get("index")
            .and_then(Value::as_u64)
            .ok_or("index is required")?;
        if !(MIN_INDEX..=MAX_INDEX).contains(&index) {
            return Err(format!("index {index} must be between 1 and 14"));
        }
        let number = result
            .get("number")
            .and_then(Value::as_u64)
            .ok_or("number is required")?;
        if number != index + 3 {
            return Err(format!("number {number} must equal index + 3"));
        }
        let multiplier = result
            .get("multiplier")
            .and_then(Value::as_f64)
            .ok_or("multiplier is required")?;
        if Some(multiplier) != multiplier_for(number) {
            return Err(format!("multiplier {multiplier} does not match number {number}"));
        }
        Ok(())
    }

    fn wins(&self, selection: &str, result: &Value) -> bool {
        let Some(number) = result.get("number").and_then(Value::as_u64) else {
            return false;
        };
        selection.parse::<u64>().map(|n| n == number).unwrap_or(false)
    }

    fn odds_for(&self, selection: &str) -> Option<f64> {
        let number = selection.parse::<u64>().ok()?;
        // numbers 3 and 18 are not playable
        if !(4..=17).contains(&number) {
            return None;
        }
        multiplier_for(number)
    }
}

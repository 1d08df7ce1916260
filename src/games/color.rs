//! Color game (2-minute rounds)
//!
//! Result: a number 0-9 and its fixed color. A bet selects either a color
//! name or an exact number.

use super::Game;
use anyhow::Result;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

pub const COLORS: [&str; 10] = [
    "red", "green", "blue", "purple", "yellow", "pink", "orange", "cyan", "black", "white",
];

pub struct ColorGame;

impl Game for ColorGame {
    fn id(&self) -> &'static str {
        "color"
    }

    fn bucket_minutes(&self) -> u32 {
        2
    }

    fn draw(&self, rng: &mut dyn RngCore) -> Result<Value> {
        let number = rng.gen_range(0..COLORS.len());
        Ok(json!({
            "number": number,
            "color": COLORS[number],
        }))
    }

    fn validate_result(&self, result: &Value) -> Result<(), String> {
        let number = result
            .get("number")
            .and_then(Value::as_u64)
            .ok_or("number is required")?;
        if number > 9 {
            return Err(format!("number {number} must be between 0 and 9"));
        }
        let color = result
            .get("color")
            .and_then(Value::as_str)
            .ok_or("color is required")?;
        if color != COLORS[number as usize] {
            return Err(format!("color '{color}' does not match number {number}"));
        }
        Ok(())
    }

    fn wins(&self, selection: &str, result: &Value) -> bool {
        let Some(number) = result.get("number").and_then(Value::as_u64) else {
            return false;
        };
        let Some(color) = result.get("color").and_then(Value::as_str) else {
            return false;
        };
        selection == color || selection.parse::<u64>().map(|n| n == number).unwrap_or(false)
    }

    fn odds_for(&self, selection: &str) -> Option<f64> {
        if COLORS.contains(&selection) {
            return Some(9.0);
        }
        selection
            .parse::<u64>()
            .ok()
            .filter(|&n| n <= 9)
            .map(|_| 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_draw_number_matches_color() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            let value = ColorGame.draw(&mut rng).unwrap();
            assert!(ColorGame.validate_result(&value).is_ok());
        }
    }

    #[test]
    fn test_color_and_number_selections() {
        let value = json!({ "number": 1, "color": "green" });
        assert!(ColorGame.wins("green", &value));
        assert!(ColorGame.wins("1", &value));
        assert!(!ColorGame.wins("red", &value));
        assert!(!ColorGame.wins("2", &value));
    }

    #[test]
    fn test_validate_result() {
        assert!(ColorGame.validate_result(&json!({ "number": 0, "color": "red" })).is_ok());
        assert!(ColorGame.validate_result(&json!({ "number": 0, "color": "green" })).is_err());
        assert!(ColorGame.validate_result(&json!({ "number": 10, "color": "red" })).is_err());
        assert!(ColorGame.validate_result(&json!({ "color": "red" })).is_err());
    }

    #[test]
    fn test_odds() {
        assert_eq!(ColorGame.odds_for("red"), Some(9.0));
        assert_eq!(ColorGame.odds_for("9"), Some(9.0));
        assert_eq!(ColorGame.odds_for("10"), None);
        assert_eq!(ColorGame.odds_for("maroon"), None);
    }
}

//! Three-dice game (1-minute rounds)
//!
//! Result: three dice 1-6 plus their total. Selections follow sic-bo
//! conventions: `big` (11-17), `small` (4-10), `odd`, `even` - all four lose
//! to a triple - or an exact total `"3"`..`"18"`.

use super::Game;
use anyhow::Result;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

pub struct DiceGame;

/// Odds for exact-total selections, symmetric around 10/11.
fn total_odds(total: u32) -> Option<f64> {
    let odds = match total {
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
    Some(odds)
}

fn parse_result(result: &Value) -> Option<([u32; 3], u32)> {
    let dice = result.get("dice")?.as_array()?;
    if dice.len() != 3 {
        return None;
    }
    let mut faces = [0u32; 3];
    for (i, d) in dice.iter().enumerate() {
        faces[i] = d.as_u64().filter(|&v| (1..=6).contains(&v))? as u32;
    }
    let total = result.get("total")?.as_u64()? as u32;
    if total != faces.iter().sum::<u32>() {
        return None;
    }
    Some((faces, total))
}

impl Game for DiceGame {
    fn id(&self) -> &'static str {
        "dice"
    }

    fn bucket_minutes(&self) -> u32 {
        1
    }

    fn draw(&self, rng: &mut dyn RngCore) -> Result<Value> {
        let dice: Vec<u32> = (0..3).map(|_| rng.gen_range(1..=6)).collect();
        let total: u32 = dice.iter().sum();
        Ok(json!({ "dice": dice, "total": total }))
    }

    fn validate_result(&self, result: &Value) -> Result<(), String> {
        parse_result(result)
            .map(|_| ())
            .ok_or_else(|| "dice result must be {dice: [three of 1-6], total: sum}".to_string())
    }

    fn wins(&self, selection: &str, result: &Value) -> bool {
        let Some((faces, total)) = parse_result(result) else {
            return false;
        };
        let triple = faces[0] == faces[1] && faces[1] == faces[2];
        match selection {
            "big" => !triple && (11..=17).contains(&total),
            "small" => !triple && (4..=10).contains(&total),
            "odd" => !triple && total % 2 == 1,
            "even" => !triple && total % 2 == 0,
            exact => exact.parse::<u32>().map(|n| n == total).unwrap_or(false),
        }
    }

    fn odds_for(&self, selection: &str) -> Option<f64> {
        match selection {
            "big" | "small" | "odd" | "even" => Some(1.95),
            exact => exact
                .parse::<u32>()
                .ok()
                .and_then(total_odds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn result(d: [u32; 3]) -> Value {
        json!({ "dice": d, "total": d.iter().sum::<u32>() })
    }

    #[test]
    fn test_draw_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let value = DiceGame.draw(&mut rng).unwrap();
            let (faces, total) = parse_result(&value).unwrap();
            assert!(faces.iter().all(|&f| (1..=6).contains(&f)));
            assert!((3..=18).contains(&total));
        }
    }

    #[test]
    fn test_big_small_resolution() {
        assert!(DiceGame.wins("big", &result([6, 5, 4])));
        assert!(!DiceGame.wins("small", &result([6, 5, 4])));
        assert!(DiceGame.wins("small", &result([1, 2, 3])));
        assert!(!DiceGame.wins("big", &result([1, 2, 3])));
    }

    #[test]
    fn test_triple_loses_even_money_bets() {
        let triple = result([4, 4, 4]);
        for sel in ["big", "small", "odd", "even"] {
            assert!(!DiceGame.wins(sel, &triple), "{sel} should lose on a triple");
        }
        // ...but an exact total still pays
        assert!(DiceGame.wins("12", &triple));
    }

    #[test]
    fn test_exact_total() {
        assert!(DiceGame.wins("13", &result([6, 4, 3])));
        assert!(!DiceGame.wins("12", &result([6, 4, 3])));
        assert!(!DiceGame.wins("banana", &result([6, 4, 3])));
    }

    #[test]
    fn test_odds_table() {
        assert_eq!(DiceGame.odds_for("big"), Some(1.95));
        assert_eq!(DiceGame.odds_for("3"), Some(180.0));
        assert_eq!(DiceGame.odds_for("10"), Some(7.0));
        assert_eq!(DiceGame.odds_for("19"), None);
        assert_eq!(DiceGame.odds_for("lucky"), None);
    }

    #[test]
    fn test_validate_result() {
        assert!(DiceGame.validate_result(&result([1, 5, 6])).is_ok());
        assert!(DiceGame
            .validate_result(&json!({ "dice": [1, 5], "total": 6 }))
            .is_err());
        assert!(DiceGame
            .validate_result(&json!({ "dice": [1, 5, 7], "total": 13 }))
            .is_err());
        // total must match the faces
        assert!(DiceGame
            .validate_result(&json!({ "dice": [1, 5, 6], "total": 13 }))
            .is_err());
    }
}

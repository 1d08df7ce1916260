//! Game Definitions
//! Mission: One trait seam between the round engine and each game's rules
//!
//! The engine never interprets a result payload itself - it only asks the
//! game to draw one, to validate an admin-supplied one, and to decide
//! whether a bet's selection wins against one.

pub mod andar_bahar;
pub mod color;
pub mod dice;
pub mod wheel;

use anyhow::Result;
use rand::RngCore;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

pub use andar_bahar::AndarBahar;
pub use color::ColorGame;
pub use dice::DiceGame;
pub use wheel::WheelGame;

/// What an automatic draw does when a round already holds a non-manual
/// result. One documented policy per game, never ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawPolicy {
    /// Existing auto result is final; the draw is a no-op.
    KeepExisting,
    /// Exactly one automatic overwrite of an unsettled auto result is
    /// allowed. Manual results and settled rounds stay untouched.
    OverwriteAuto,
}

/// Game-specific rules consumed by the engine.
pub trait Game: Send + Sync {
    /// Stable identifier used in round keys, URLs and storage.
    fn id(&self) -> &'static str;

    /// Round length: 1 or 2 minutes.
    fn bucket_minutes(&self) -> u32;

    fn redraw_policy(&self) -> RedrawPolicy {
        RedrawPolicy::KeepExisting
    }

    /// Draw a fresh result from the game's allowed outcome set.
    /// Fails only when an internal guard detects a forbidden outcome, in
    /// which case nothing may be written.
    fn draw(&self, rng: &mut dyn RngCore) -> Result<Value>;

    /// Validate an admin-supplied result payload before it is stored.
    fn validate_result(&self, result: &Value) -> Result<(), String>;

    /// Resolution rule: does `selection` win against `result`?
    fn wins(&self, selection: &str, result: &Value) -> bool;

    /// Odds multiplier applied at bet placement for a selection, or `None`
    /// if the selection is not part of this game.
    fn odds_for(&self, selection: &str) -> Option<f64>;
}

/// All configured games, keyed by id.
pub struct GameRegistry {
    games: HashMap<&'static str, Arc<dyn Game>>,
}

impl GameRegistry {
    /// The four production games.
    pub fn standard() -> Self {
        let mut games: HashMap<&'static str, Arc<dyn Game>> = HashMap::new();
        for game in [
            Arc::new(DiceGame) as Arc<dyn Game>,
            Arc::new(AndarBahar),
            Arc::new(WheelGame),
            Arc::new(ColorGame),
        ] {
            games.insert(game.id(), game);
        }
        Self { games }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Game>> {
        self.games.get(id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Game>> {
        self.games.values()
    }
}

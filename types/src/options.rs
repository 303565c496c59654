use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOptions {
    pub variant: String,
    pub timed: bool,
    /// Seconds on each player's clock at the start of a timed game.
    pub time_base: i64,
    /// Seconds added to a player's clock after each of their turns.
    pub time_per_turn: i64,
    pub speedrun: bool,
    pub card_cycle: bool,
    pub deck_plays: bool,
    pub empty_clues: bool,
    pub character_assignments: bool,
    /// Set when the game is a re-play of an archived game rather than a live one.
    pub replay: bool,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            variant: "No Variant".to_string(),
            timed: false,
            time_base: 120,
            time_per_turn: 20,
            speedrun: false,
            card_cycle: false,
            deck_plays: false,
            empty_clues: false,
            character_assignments: false,
            replay: false,
        }
    }
}

impl GameOptions {
    /// Stats tie-break: +1 for deck plays, +2 for empty clues.
    pub fn modifier(&self) -> i32 {
        let mut modifier = 0;
        if self.deck_plays {
            modifier += 1;
        }
        if self.empty_clues {
            modifier += 2;
        }
        modifier
    }
}

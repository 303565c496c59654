use serde::{Deserialize, Serialize};
use types::EndCondition;

/// Best-score tables hold one slot per player count, 2 through 6.
pub const NUM_PLAYER_BUCKETS: usize = 5;

/// Slot for a game with `num_players` players; 2-player games are slot 0.
pub fn player_bucket(num_players: usize) -> Option<usize> {
    num_players
        .checked_sub(2)
        .filter(|&idx| idx < NUM_PLAYER_BUCKETS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub name: String,
    pub num_players: usize,
    pub variant_id: i32,
    pub timed: bool,
    pub time_base: i64,
    pub time_per_turn: i64,
    pub speedrun: bool,
    pub card_cycle: bool,
    pub deck_plays: bool,
    pub empty_clues: bool,
    pub character_assignments: bool,
    pub seed: String,
    pub score: usize,
    pub num_turns: usize,
    pub end_condition: EndCondition,
    pub datetime_started: chrono::DateTime<chrono::Utc>,
    pub datetime_finished: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestScore {
    pub score: i32,
    pub modifier: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatsRow {
    pub num_games: i64,
    pub best_scores: Vec<BestScore>,
    pub average_score: f64,
    pub num_strikeouts: i64,
}

impl Default for UserStatsRow {
    fn default() -> Self {
        Self {
            num_games: 0,
            best_scores: vec![BestScore::default(); NUM_PLAYER_BUCKETS],
            average_score: 0.0,
            num_strikeouts: 0,
        }
    }
}

impl UserStatsRow {
    pub fn strikeout_rate(&self) -> f64 {
        if self.num_games == 0 {
            return 0.0;
        }
        self.num_strikeouts as f64 / self.num_games as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStatsRow {
    pub num_games: i64,
    pub best_scores: Vec<i32>,
    pub num_max_scores: i64,
    pub average_score: f64,
    pub num_strikeouts: i64,
}

impl Default for VariantStatsRow {
    fn default() -> Self {
        Self {
            num_games: 0,
            best_scores: vec![0; NUM_PLAYER_BUCKETS],
            num_max_scores: 0,
            average_score: 0.0,
            num_strikeouts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHistoryRecord {
    pub id: i64,
    pub num_players: usize,
    pub variant: String,
    pub timed: bool,
    pub time_base: i64,
    pub time_per_turn: i64,
    pub speedrun: bool,
    pub card_cycle: bool,
    pub deck_plays: bool,
    pub empty_clues: bool,
    pub character_assignments: bool,
    pub seed: String,
    pub score: usize,
    pub num_turns: usize,
    pub end_condition: EndCondition,
    pub datetime_started: chrono::DateTime<chrono::Utc>,
    pub datetime_finished: chrono::DateTime<chrono::Utc>,
    pub num_similar: i64,
    pub player_names: String,
    pub increment_num_games: bool,
}

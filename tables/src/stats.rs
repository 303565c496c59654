//! Folding a finished game into the per-user and per-variant statistics.

use database::{player_bucket, BestScore, UserStatsRow, VariantStatsRow};
use types::{EndCondition, Game};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameResult {
    pub num_players: usize,
    pub score: i32,
    pub modifier: i32,
    pub max_score: i32,
    pub strikeout: bool,
}

impl GameResult {
    pub fn from_game(game: &Game) -> Self {
        Self {
            num_players: game.players.len(),
            score: game.score as i32,
            modifier: game.options.modifier(),
            max_score: game.max_score as i32,
            strikeout: game.end_condition == EndCondition::Strikeout,
        }
    }
}

/// A higher score always wins. An equal score only wins with a stricter
/// (lower) modifier.
pub fn beats(score: i32, modifier: i32, best: &BestScore) -> bool {
    score > best.score || (score == best.score && modifier < best.modifier)
}

fn running_average(average: f64, count: i64, value: i32) -> f64 {
    if count <= 0 {
        return value as f64;
    }
    average + (value as f64 - average) / count as f64
}

pub fn fold_user_stats(stats: &mut UserStatsRow, result: &GameResult) -> bool {
    stats.num_games += 1;
    stats.average_score = running_average(stats.average_score, stats.num_games, result.score);
    if result.strikeout {
        stats.num_strikeouts += 1;
    }
    let Some(best) = player_bucket(result.num_players).and_then(|i| stats.best_scores.get_mut(i))
    else {
        return false;
    };
    if !beats(result.score, result.modifier, best) {
        return false;
    }
    *best = BestScore {
        score: result.score,
        modifier: result.modifier,
    };
    true
}

/// Variant bests only count games with no relaxed rules; the game counter and
/// averages always move.
pub fn fold_variant_stats(stats: &mut VariantStatsRow, result: &GameResult) {
    stats.num_games += 1;
    stats.average_score = running_average(stats.average_score, stats.num_games, result.score);
    if result.strikeout {
        stats.num_strikeouts += 1;
    }
    if result.modifier != 0 {
        return;
    }
    if result.score == result.max_score {
        stats.num_max_scores += 1;
    }
    if let Some(best) = player_bucket(result.num_players).and_then(|i| stats.best_scores.get_mut(i))
    {
        if result.score > *best {
            *best = result.score;
        }
    }
}

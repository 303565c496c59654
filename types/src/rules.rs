use std::fmt::Debug;

use crate::{
    game::{GameError, MAX_CLUE_TOKENS, MAX_STRIKES},
    Action, Clue, EndCondition, Game,
};

/// Validates and applies in-turn actions. Tables only talk to the rules
/// through this trait.
pub trait RulesEngine: Debug + Send + Sync {
    /// Applies `action` for the player at `player`. On error the game is untouched.
    fn apply(&self, game: &mut Game, player: usize, action: &Action) -> Result<(), GameError>;

    fn end_condition(&self, game: &Game) -> Option<EndCondition>;
}

#[derive(Debug, Default)]
pub struct StandardRules;

impl StandardRules {
    fn check_player(player: usize, named: usize) -> Result<(), GameError> {
        if player != named {
            return Err(GameError::WrongPlayer {
                expected: player,
                given: named,
            });
        }
        Ok(())
    }
}

impl RulesEngine for StandardRules {
    fn apply(&self, game: &mut Game, player: usize, action: &Action) -> Result<(), GameError> {
        if game.is_over() {
            return Err(GameError::GameOver);
        }
        match action {
            Action::Play { player: named, target } => {
                Self::check_player(player, *named)?;
                let card = game.players[player]
                    .remove_card(*target)
                    .ok_or(GameError::CardNotInHand(*target))?;
                if game.stacks[card.suit] + 1 == card.rank {
                    game.stacks[card.suit] = card.rank;
                    game.score += 1;
                    if card.rank == 5 && game.clue_tokens < MAX_CLUE_TOKENS {
                        game.clue_tokens += 1;
                    }
                } else {
                    game.strikes += 1;
                    log::debug!("Misplay of {card}, strike {}", game.strikes);
                }
                game.draw(player);
            }
            Action::Discard { player: named, target } => {
                Self::check_player(player, *named)?;
                if game.clue_tokens >= MAX_CLUE_TOKENS {
                    return Err(GameError::MaxClueTokens);
                }
                if !game.players[player].holds(*target) {
                    return Err(GameError::CardNotInHand(*target));
                }
                game.players[player].remove_card(*target);
                game.clue_tokens += 1;
                game.draw(player);
            }
            Action::Clue {
                player: named,
                target,
                clue,
            } => {
                Self::check_player(player, *named)?;
                if *target == player || *target >= game.players.len() {
                    return Err(GameError::InvalidTarget(*target));
                }
                if game.clue_tokens == 0 {
                    return Err(GameError::NoClueTokens);
                }
                let touches = game.players[*target].hand.iter().any(|card| match clue {
                    Clue::Color(suit) => card.suit == *suit,
                    Clue::Rank(rank) => card.rank == *rank,
                });
                if !touches && !game.options.empty_clues {
                    return Err(GameError::EmptyClue);
                }
                game.clue_tokens -= 1;
            }
            other => return Err(GameError::NotATurnAction(other.type_name())),
        }
        Ok(())
    }

    fn end_condition(&self, game: &Game) -> Option<EndCondition> {
        if game.strikes >= MAX_STRIKES {
            return Some(EndCondition::Strikeout);
        }
        if game.score >= game.max_score {
            return Some(EndCondition::Normal);
        }
        match game.end_turn {
            Some(end_turn) if game.turn >= end_turn => Some(EndCondition::Normal),
            _ => None,
        }
    }
}

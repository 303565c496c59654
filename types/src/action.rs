use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{card::SimpleCard, EndCondition};

/// A clue handed to another player: either a suit (color) or a rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Clue {
    Color(usize),
    Rank(usize),
}

/// Every record that can end up in a game's action logs. The broadcast log
/// and the persisted turn log share this set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Play { player: usize, target: usize },
    Discard { player: usize, target: usize },
    Clue { player: usize, target: usize, clue: Clue },
    DeckOrder { deck: Vec<SimpleCard> },
    Text { text: String },
    GameOver { target: usize, value: EndCondition },
}

impl Action {
    pub fn is_turn_action(&self) -> bool {
        matches!(
            self,
            Action::Play { .. } | Action::Discard { .. } | Action::Clue { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Play { .. } => "play",
            Action::Discard { .. } => "discard",
            Action::Clue { .. } => "clue",
            Action::DeckOrder { .. } => "deckOrder",
            Action::Text { .. } => "text",
            Action::GameOver { .. } => "gameOver",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = match self {
            Action::Play { player, target } => format!("player {player} plays #{target}"),
            Action::Discard { player, target } => format!("player {player} discards #{target}"),
            Action::Clue {
                player,
                target,
                clue,
            } => format!("player {player} clues player {target} about {clue:?}"),
            Action::DeckOrder { deck } => {
                let cards = deck.iter().map(|c| format!("s{}r{}", c.suit, c.rank)).join(",");
                format!("deck order: {cards}")
            }
            Action::Text { text } => text.clone(),
            Action::GameOver { target, value } => format!("game over ({value}) by {target}"),
        };
        write!(f, "{}", string)
    }
}

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A card as dealt in a specific game. `order` is its position in the shuffled
/// deck and stays stable for the lifetime of the game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: usize,
    pub rank: usize,
    pub order: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleCard {
    pub suit: usize,
    pub rank: usize,
}

impl Card {
    pub fn new(suit: usize, rank: usize, order: usize) -> Self {
        Self { suit, rank, order }
    }

    pub fn simple(&self) -> SimpleCard {
        SimpleCard {
            suit: self.suit,
            rank: self.rank,
        }
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}r{} (#{})", self.suit, self.rank, self.order)
    }
}

pub const RANK_COPIES: [(usize, usize); 5] = [(1, 3), (2, 2), (3, 2), (4, 2), (5, 1)];

/// Builds the unshuffled deck for `num_suits` suits. Orders are assigned
/// later, once the deck has been shuffled.
pub fn unshuffled_deck(num_suits: usize) -> Vec<SimpleCard> {
    (0..num_suits)
        .flat_map(|suit| {
            RANK_COPIES.iter().flat_map(move |&(rank, copies)| {
                (0..copies).map(move |_| SimpleCard { suit, rank })
            })
        })
        .collect()
}

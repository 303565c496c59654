use chrono::Duration;

use crate::Card;

/// A seat inside a running game. Connection state lives on the table side.
#[derive(Clone, Debug)]
pub struct GamePlayer {
    pub index: usize,
    pub name: String,
    pub hand: Vec<Card>,
    /// One note per card in the deck, indexed by card order.
    pub notes: Vec<String>,
    /// Remaining clock in timed games; in untimed games this counts down from
    /// zero, so it holds the negated elapsed time.
    pub time: Duration,
    pub character: Option<String>,
    pub character_metadata: i32,
}

impl GamePlayer {
    pub fn new(index: usize, name: String, deck_size: usize, time: Duration) -> Self {
        Self {
            index,
            name,
            hand: Vec::new(),
            notes: vec![String::new(); deck_size],
            time,
            character: None,
            character_metadata: -1,
        }
    }

    pub fn remove_card(&mut self, order: usize) -> Option<Card> {
        let idx = self.hand.iter().position(|c| c.order == order)?;
        Some(self.hand.remove(idx))
    }

    pub fn holds(&self, order: usize) -> bool {
        self.hand.iter().any(|c| c.order == order)
    }
}

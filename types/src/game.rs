use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use regex::Regex;
use thiserror::Error;

use crate::{
    card::unshuffled_deck,
    timing::{player_time_announcement, total_duration_announcement},
    Action, Card, EndCondition, GameOptions, GamePlayer, Variant,
};

static SEED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"p\dv\d+s(\d+)").expect("Valid seed regex"));

pub const MAX_CLUE_TOKENS: usize = 8;
pub const MAX_STRIKES: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Card #{0} is not in the player's hand")]
    CardNotInHand(usize),

    #[error("Invalid clue target: player {0}")]
    InvalidTarget(usize),

    #[error("Action names player {given} but it is player {expected}'s turn")]
    WrongPlayer { expected: usize, given: usize },

    #[error("There are no clue tokens left")]
    NoClueTokens,

    #[error("Cannot discard while at the maximum number of clue tokens")]
    MaxClueTokens,

    #[error("The clue touches no cards")]
    EmptyClue,

    #[error("{0} is not an in-turn action")]
    NotATurnAction(&'static str),

    #[error("The game is already over")]
    GameOver,

    #[error("The game has been archived and its action log is frozen")]
    Archived,
}

#[derive(Clone, Debug)]
pub struct Game {
    pub id: Option<i64>,
    pub options: GameOptions,
    pub variant_id: i32,
    pub num_suits: usize,
    pub max_score: usize,
    pub seed: String,
    pub deck: Vec<Card>,
    pub deck_index: usize,
    pub players: Vec<GamePlayer>,
    pub stacks: Vec<usize>,
    pub clue_tokens: usize,
    pub strikes: usize,
    pub score: usize,
    pub turn: usize,
    pub active_player: usize,
    pub end_turn: Option<usize>,
    pub end_condition: EndCondition,
    pub end_player: usize,
    /// Everything broadcast to the table, including system text.
    pub actions: Vec<Action>,
    /// In-turn actions only; the index doubles as the turn number when persisted.
    pub turn_actions: Vec<Action>,
    pub datetime_started: DateTime<Utc>,
    pub datetime_finished: Option<DateTime<Utc>>,
    pub turn_began_at: DateTime<Utc>,
    archived: bool,
}

fn seed_hash(seed: &str) -> u64 {
    // FNV-1a
    seed.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

pub fn hand_size(num_players: usize) -> usize {
    match num_players {
        0..=3 => 5,
        4 | 5 => 4,
        _ => 3,
    }
}

impl Game {
    pub fn new(
        options: GameOptions,
        variant: &Variant,
        player_names: Vec<String>,
        seed_suffix: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let num_players = player_names.len();
        let seed = format!("p{}v{}s{}", num_players, variant.id, seed_suffix);

        let mut simple = unshuffled_deck(variant.suits.len());
        simple.shuffle(&mut StdRng::seed_from_u64(seed_hash(&seed)));
        let deck: Vec<Card> = simple
            .into_iter()
            .enumerate()
            .map(|(order, c)| Card::new(c.suit, c.rank, order))
            .collect();

        let starting_time = if options.timed {
            Duration::seconds(options.time_base)
        } else {
            Duration::zero()
        };
        let players = player_names
            .into_iter()
            .enumerate()
            .map(|(index, name)| GamePlayer::new(index, name, deck.len(), starting_time))
            .collect();

        log::info!("Created game on seed {seed} with {num_players} players");

        let mut game = Self {
            id: None,
            options,
            variant_id: variant.id,
            num_suits: variant.suits.len(),
            max_score: variant.max_score(),
            seed,
            deck,
            deck_index: 0,
            players,
            stacks: vec![0; variant.suits.len()],
            clue_tokens: MAX_CLUE_TOKENS,
            strikes: 0,
            score: 0,
            turn: 0,
            active_player: 0,
            end_turn: None,
            end_condition: EndCondition::InProgress,
            end_player: 0,
            actions: Vec::new(),
            turn_actions: Vec::new(),
            datetime_started: now,
            datetime_finished: None,
            turn_began_at: now,
            archived: false,
        };
        for player in 0..num_players {
            for _ in 0..hand_size(num_players) {
                game.draw(player);
            }
        }
        game
    }

    /// Deals one character per seat, shuffled by the game seed. Seats go
    /// without a character when there are not enough to go round.
    pub fn assign_characters(&mut self, mut names: Vec<String>) {
        names.shuffle(&mut StdRng::seed_from_u64(seed_hash(&self.seed)));
        for (player, name) in self.players.iter_mut().zip(names) {
            player.character = Some(name);
            player.character_metadata = -1;
        }
    }

    pub fn is_over(&self) -> bool {
        self.end_condition != EndCondition::InProgress
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn mark_archived(&mut self, id: i64) {
        self.id = Some(id);
        self.archived = true;
    }

    pub fn cards_left(&self) -> usize {
        self.deck.len() - self.deck_index
    }

    /// Moves the top card of the deck into `player`'s hand. Drawing the last
    /// card gives everyone one more turn.
    pub fn draw(&mut self, player: usize) -> Option<Card> {
        let card = *self.deck.get(self.deck_index)?;
        self.deck_index += 1;
        self.players[player].hand.push(card);
        if self.deck_index == self.deck.len() && self.end_turn.is_none() {
            self.end_turn = Some(self.turn + self.players.len() + 1);
        }
        Some(card)
    }

    pub fn append_action(&mut self, action: Action) -> Result<(), GameError> {
        if self.archived {
            return Err(GameError::Archived);
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn log_turn_action(&mut self, action: Action) -> Result<(), GameError> {
        self.append_action(action.clone())?;
        self.turn_actions.push(action);
        Ok(())
    }

    /// Charges the time since the turn began to the active player.
    /// Returns true if a timed player ran out of time.
    pub fn charge_clock(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed = now - self.turn_began_at;
        self.turn_began_at = now;
        let player = &mut self.players[self.active_player];
        player.time = player.time - elapsed;
        self.options.timed && player.time <= Duration::zero()
    }

    pub fn add_turn_bonus(&mut self) {
        if self.options.timed {
            let player = &mut self.players[self.active_player];
            player.time = player.time + Duration::seconds(self.options.time_per_turn);
        }
    }

    pub fn advance_turn(&mut self) {
        self.turn += 1;
        self.active_player = (self.active_player + 1) % self.players.len();
    }

    /// Stops the clock and applies the abnormal-stop scoring rule.
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        self.datetime_finished = Some(now);
        if self.end_condition.is_abnormal() {
            self.score = 0;
        }
    }

    pub fn deck_order_action(&self) -> Action {
        Action::DeckOrder {
            deck: self.deck.iter().map(Card::simple).collect(),
        }
    }

    pub fn player_time_announcements(&self) -> Vec<String> {
        self.players
            .iter()
            .map(|p| player_time_announcement(&p.name, self.options.timed, p.time))
            .collect()
    }

    pub fn duration_announcement(&self) -> String {
        let finished = self.datetime_finished.unwrap_or(self.datetime_started);
        total_duration_announcement(finished - self.datetime_started)
    }

    pub fn game_over_action(&self) -> Option<Action> {
        if !self.end_condition.needs_game_over_action() {
            return None;
        }
        let target = match self.end_condition {
            EndCondition::IdleTimeout => 0,
            _ => self.end_player,
        };
        Some(Action::GameOver {
            target,
            value: self.end_condition,
        })
    }

    /// Lobby line announcing the result. Empty if the seed does not parse.
    pub fn announcement_string(&self) -> String {
        let names = self.players.iter().map(|p| p.name.as_str()).join(", ");
        let terminated = self.end_condition == EndCondition::Terminated;
        let verb = if terminated { "terminated" } else { "finished" };
        let variant = &self.options.variant;
        let article = match variant.to_lowercase().chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        };
        let mut msg = format!("[{names}] {verb} {article} {variant} game");
        if terminated {
            msg.push_str(". ");
        } else {
            msg.push_str(&format!(" with a score of {}. ", self.score));
        }
        let id = self.id.unwrap_or_default();
        let Some(suffix) = SEED_REGEX.captures(&self.seed).and_then(|c| c.get(1)) else {
            log::error!(
                "Failed to parse the seed of \"{}\" when ending game {id}",
                self.seed
            );
            return String::new();
        };
        msg.push_str(&format!("(id: {id}, seed: {})", suffix.as_str()));
        msg
    }
}

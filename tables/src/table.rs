//! The table state machine. A `Table` is only ever touched by its own actor,
//! so nothing here needs locking.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use types::{Action, Catalog, EndCondition, Game, GameOptions, RulesEngine};

use crate::{
    error::TableError,
    message::{NoteListEntry, TableSummary},
    session::{Session, Status},
};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TableState {
    Lobby,
    Running,
    Ending,
    Replay,
    Deleted,
}

impl TableState {
    pub fn can_become(self, next: TableState) -> bool {
        use TableState::*;
        matches!(
            (self, next),
            (Lobby, Running)
                | (Running, Ending)
                | (Ending, Replay)
                | (Lobby | Running | Ending | Replay, Deleted)
        )
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub user_id: i64,
    pub name: String,
    pub session: Option<Arc<Session>>,
    /// False once the player has wandered back to the lobby or dropped.
    pub present: bool,
}

impl Player {
    pub fn from_session(session: Arc<Session>) -> Self {
        Self {
            user_id: session.user_id,
            name: session.name.clone(),
            session: Some(session),
            present: true,
        }
    }

    /// Fully offline, as opposed to merely sitting in the lobby.
    pub fn is_offline(&self) -> bool {
        self.session.as_ref().map_or(true, |s| s.is_closed())
    }
}

#[derive(Clone, Debug)]
pub struct Spectator {
    pub user_id: i64,
    pub name: String,
    pub session: Option<Arc<Session>>,
    /// One slot per deck card plus one per suit for stack-base notes.
    pub notes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub user_id: i64,
    pub name: String,
    pub msg: String,
    pub datetime: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    GameEnded,
    TimedOut,
}

#[derive(Clone, Debug)]
pub struct Table {
    pub id: u64,
    pub name: String,
    pub state: TableState,
    pub owner: i64,
    pub options: GameOptions,
    pub players: Vec<Player>,
    pub spectators: Vec<Spectator>,
    pub game: Option<Game>,
    pub chat: Vec<ChatMessage>,
    pub tags: BTreeSet<String>,
    pub progress: u8,
}

impl Table {
    pub fn new(id: u64, name: String, owner: Arc<Session>, options: GameOptions) -> Self {
        owner.set_status(Status::PreGame, Some(id));
        Self {
            id,
            name,
            state: TableState::Lobby,
            owner: owner.user_id,
            options,
            players: vec![Player::from_session(owner)],
            spectators: Vec::new(),
            game: None,
            chat: Vec::new(),
            tags: BTreeSet::new(),
            progress: 0,
        }
    }

    pub fn log_prefix(&self) -> String {
        format!("Table #{} ({}) - ", self.id, self.name)
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TableState::Deleted
    }

    pub fn transition(&mut self, next: TableState) -> Result<(), TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        if !self.state.can_become(next) {
            return Err(TableError::WrongState(self.state));
        }
        log::debug!("{}{:?} -> {:?}", self.log_prefix(), self.state, next);
        self.state = next;
        Ok(())
    }

    fn require(&self, state: TableState) -> Result<(), TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        if self.state != state {
            return Err(TableError::WrongState(self.state));
        }
        Ok(())
    }

    pub fn participant_count(&self) -> usize {
        self.players.len() + self.spectators.len()
    }

    pub fn seat_of(&self, user_id: i64) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn spectator_of(&self, user_id: i64) -> Option<usize> {
        self.spectators.iter().position(|s| s.user_id == user_id)
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    /// Whether `user_id` currently belongs to the table. A shared replay only
    /// counts its spectators.
    pub fn is_member(&self, user_id: i64) -> bool {
        match self.state {
            TableState::Replay => self.spectator_of(user_id).is_some(),
            _ => self.seat_of(user_id).is_some() || self.spectator_of(user_id).is_some(),
        }
    }

    /// Every live connection at the table, each user once. A shared replay
    /// only reaches its spectators.
    pub fn sessions(&self) -> impl Iterator<Item = &Arc<Session>> {
        let seated = match self.state {
            TableState::Replay => &self.players[..0],
            _ => &self.players[..],
        };
        seated
            .iter()
            .filter_map(|p| p.session.as_ref())
            .chain(self.spectators.iter().filter_map(|s| s.session.as_ref()))
            .filter(|s| !s.is_closed())
            .unique_by(|s| s.user_id)
    }

    /// Seats every player with a live connection as a spectator of the
    /// replay and returns their sessions.
    pub fn seat_players_as_spectators(&mut self) -> Vec<Arc<Session>> {
        let num_notes = self
            .game
            .as_ref()
            .map_or(0, |game| game.deck.len() + game.num_suits);
        let seated = self
            .players
            .iter()
            .filter(|p| !p.is_offline() && self.spectator_of(p.user_id).is_none())
            .map(|p| Spectator {
                user_id: p.user_id,
                name: p.name.clone(),
                session: p.session.clone(),
                notes: vec![String::new(); num_notes],
            })
            .collect_vec();
        self.spectators.extend(seated);
        self.spectators
            .iter()
            .filter_map(|s| s.session.clone())
            .collect()
    }

    pub fn join(&mut self, session: Arc<Session>) -> Result<(), TableError> {
        self.require(TableState::Lobby)?;
        if self.seat_of(session.user_id).is_some() {
            return Err(TableError::AlreadyJoined(session.user_id));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(TableError::TableFull);
        }
        session.set_status(Status::PreGame, Some(self.id));
        log::info!("{}{} joined", self.log_prefix(), session.name);
        self.players.push(Player::from_session(session));
        Ok(())
    }

    /// Removes a player from the pre-game lobby or a spectator from a shared
    /// replay, deleting the table once nobody is left.
    pub fn leave(&mut self, user_id: i64) -> Result<(), TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        let session = match self.state {
            TableState::Lobby => {
                let seat = self.seat_of(user_id).ok_or(TableError::NotAtTable(user_id))?;
                let player = self.players.remove(seat);
                if player.user_id == self.owner {
                    if let Some(next) = self.players.first() {
                        self.owner = next.user_id;
                    }
                }
                player.session
            }
            TableState::Replay => {
                let idx = self
                    .spectator_of(user_id)
                    .ok_or(TableError::NotAtTable(user_id))?;
                let spectator = self.spectators.remove(idx);
                if spectator.user_id == self.owner {
                    if let Some(next) = self.spectators.first() {
                        log::info!("{}Passing the leader to {}", self.log_prefix(), next.name);
                        self.owner = next.user_id;
                    }
                }
                spectator.session
            }
            state => return Err(TableError::WrongState(state)),
        };
        if let Some(session) = session {
            session.set_status(Status::Lobby, None);
        }
        let empty = match self.state {
            TableState::Replay => self.spectators.is_empty(),
            _ => self.participant_count() == 0,
        };
        if empty {
            log::info!("{}No participants left, deleting", self.log_prefix());
            self.state = TableState::Deleted;
        }
        Ok(())
    }

    pub fn start(
        &mut self,
        user_id: i64,
        catalog: &Catalog,
        seed_suffix: u64,
        now: DateTime<Utc>,
    ) -> Result<(), TableError> {
        self.require(TableState::Lobby)?;
        if user_id != self.owner {
            return Err(TableError::NotOwner);
        }
        let count = self.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(TableError::PlayerCount(count));
        }
        let variant = catalog
            .variant(&self.options.variant)
            .ok_or_else(|| TableError::UnknownVariant(self.options.variant.clone()))?;
        let names = self.players.iter().map(|p| p.name.clone()).collect();
        let mut game = Game::new(self.options.clone(), variant, names, seed_suffix, now);
        if self.options.character_assignments {
            game.assign_characters(catalog.character_names());
        }
        self.game = Some(game);
        for session in self.players.iter().filter_map(|p| p.session.as_ref()) {
            session.set_status(Status::Playing, Some(self.id));
        }
        self.transition(TableState::Running)?;
        log::info!("{}Game started", self.log_prefix());
        Ok(())
    }

    fn running_game(&mut self) -> Result<&mut Game, TableError> {
        self.require(TableState::Running)?;
        self.game.as_mut().ok_or(TableError::WrongState(TableState::Lobby))
    }

    fn begin_ending(
        &mut self,
        condition: EndCondition,
        end_player: usize,
    ) -> Result<(), TableError> {
        let game = self.running_game()?;
        game.end_condition = condition;
        game.end_player = end_player;
        self.transition(TableState::Ending)
    }

    pub fn perform(
        &mut self,
        user_id: i64,
        action: Action,
        rules: &dyn RulesEngine,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome, TableError> {
        let seat = self.seat_of(user_id).ok_or(TableError::NotAtTable(user_id))?;
        let game = self.running_game()?;
        if game.active_player != seat {
            return Err(TableError::NotYourTurn(user_id));
        }
        if game.charge_clock(now) {
            log::info!("{}Player {seat} ran out of time", self.log_prefix());
            self.begin_ending(EndCondition::Timeout, seat)?;
            return Ok(TurnOutcome::TimedOut);
        }
        rules.apply(game, seat, &action)?;
        game.log_turn_action(action)?;
        game.add_turn_bonus();
        game.advance_turn();
        if let Some(condition) = rules.end_condition(game) {
            self.begin_ending(condition, seat)?;
            return Ok(TurnOutcome::GameEnded);
        }
        Ok(TurnOutcome::Continue)
    }

    pub fn terminate(&mut self, user_id: i64) -> Result<(), TableError> {
        let seat = self.seat_of(user_id).ok_or(TableError::NotAtTable(user_id))?;
        log::info!("{}Terminated by player {seat}", self.log_prefix());
        self.begin_ending(EndCondition::Terminated, seat)
    }

    /// Returns true when a running game must go through the end sequence;
    /// idle tables in any other state are simply deleted.
    pub fn idle_timeout(&mut self) -> Result<bool, TableError> {
        match self.state {
            TableState::Running => {
                self.begin_ending(EndCondition::IdleTimeout, 0)?;
                Ok(true)
            }
            TableState::Deleted => Err(TableError::Deleted(self.id)),
            TableState::Ending => Err(TableError::WrongState(self.state)),
            _ => {
                log::info!("{}Idle, deleting", self.log_prefix());
                self.transition(TableState::Deleted)?;
                Ok(false)
            }
        }
    }

    pub fn set_presence(
        &mut self,
        user_id: i64,
        present: bool,
        session: Option<Arc<Session>>,
    ) -> Result<(), TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        if !self.is_member(user_id) {
            return Err(TableError::NotAtTable(user_id));
        }
        if let Some(seat) = self.seat_of(user_id).filter(|_| self.state != TableState::Replay) {
            let player = &mut self.players[seat];
            player.present = present;
            player.session = session.clone();
        }
        if let Some(idx) = self.spectator_of(user_id) {
            self.spectators[idx].session = session;
        }
        Ok(())
    }

    pub fn set_note(&mut self, user_id: i64, order: usize, text: String) -> Result<(), TableError> {
        match self.state {
            TableState::Running => {
                let seat = self.seat_of(user_id).ok_or(TableError::NotAtTable(user_id))?;
                let game = self.running_game()?;
                let slot = game.players[seat]
                    .notes
                    .get_mut(order)
                    .ok_or(TableError::InvalidNote(order))?;
                *slot = text;
            }
            TableState::Replay => {
                let idx = self
                    .spectator_of(user_id)
                    .ok_or(TableError::NotAtTable(user_id))?;
                let slot = self.spectators[idx]
                    .notes
                    .get_mut(order)
                    .ok_or(TableError::InvalidNote(order))?;
                *slot = text;
            }
            TableState::Deleted => return Err(TableError::Deleted(self.id)),
            state => return Err(TableError::WrongState(state)),
        }
        Ok(())
    }

    pub fn add_chat(
        &mut self,
        user_id: i64,
        msg: String,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        if !self.is_member(user_id) {
            return Err(TableError::NotAtTable(user_id));
        }
        let name = self
            .players
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.name.clone())
            .or_else(|| {
                self.spectators
                    .iter()
                    .find(|s| s.user_id == user_id)
                    .map(|s| s.name.clone())
            })
            .ok_or(TableError::NotAtTable(user_id))?;
        let message = ChatMessage {
            user_id,
            name,
            msg,
            datetime: now,
        };
        self.chat.push(message.clone());
        Ok(message)
    }

    pub fn add_tag(&mut self, user_id: i64, tag: String) -> Result<(), TableError> {
        if self.is_deleted() {
            return Err(TableError::Deleted(self.id));
        }
        if !self.is_member(user_id) {
            return Err(TableError::NotAtTable(user_id));
        }
        self.tags.insert(tag.trim().to_lowercase());
        Ok(())
    }

    fn require_leader(&self, user_id: i64) -> Result<(), TableError> {
        self.require(TableState::Replay)?;
        if user_id != self.owner {
            return Err(TableError::NotLeader);
        }
        Ok(())
    }

    pub fn set_replay_turn(&mut self, user_id: i64, turn: usize) -> Result<(), TableError> {
        self.require_leader(user_id)?;
        let game = self.game.as_mut().ok_or(TableError::WrongState(self.state))?;
        let last = game.end_turn.unwrap_or(game.turn);
        if turn > last {
            return Err(TableError::InvalidTurn(turn));
        }
        game.turn = turn;
        Ok(())
    }

    pub fn transfer_leader(&mut self, user_id: i64, new_leader: i64) -> Result<(), TableError> {
        self.require_leader(user_id)?;
        if self.spectator_of(new_leader).is_none() {
            return Err(TableError::NotAtTable(new_leader));
        }
        self.owner = new_leader;
        Ok(())
    }

    pub fn note_list(&self) -> Vec<NoteListEntry> {
        let player_notes = self.game.iter().flat_map(|game| {
            game.players.iter().map(|p| NoteListEntry {
                name: p.name.clone(),
                notes: p.notes.clone(),
            })
        });
        let spectator_notes = self.spectators.iter().map(|s| NoteListEntry {
            name: s.name.clone(),
            notes: s.notes.clone(),
        });
        player_notes.chain(spectator_notes).collect()
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner,
            state: self.state,
            variant: self.options.variant.clone(),
            players: self.players.iter().map(|p| p.name.clone()).collect(),
            spectators: self.spectators.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use types::{Clue, StandardRules};

    use super::*;

    fn lobby_table(names: &[&str]) -> Table {
        let (owner, _rx) = Session::new(1, names[0]);
        let mut table = Table::new(1, "test".to_string(), owner, GameOptions::default());
        for (i, name) in names.iter().enumerate().skip(1) {
            let (session, _rx) = Session::new(i as i64 + 1, *name);
            table.join(session).expect("lobby join");
        }
        table
    }

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(TableState::Lobby.can_become(TableState::Running));
        assert!(TableState::Ending.can_become(TableState::Replay));
        assert!(!TableState::Replay.can_become(TableState::Running));
        assert!(!TableState::Deleted.can_become(TableState::Running));
        assert!(!TableState::Running.can_become(TableState::Lobby));
    }

    #[test]
    fn test_start_requires_owner_and_two_players() {
        let catalog = Catalog::standard();
        let mut table = lobby_table(&["Alice"]);
        assert!(matches!(
            table.start(1, &catalog, 1, Utc::now()),
            Err(TableError::PlayerCount(1))
        ));

        let mut table = lobby_table(&["Alice", "Bob"]);
        assert!(matches!(
            table.start(2, &catalog, 1, Utc::now()),
            Err(TableError::NotOwner)
        ));
        table.start(1, &catalog, 1, Utc::now()).expect("owner starts");
        assert_eq!(table.state, TableState::Running);
        assert!(matches!(
            table.join(Session::new(9, "Late").0),
            Err(TableError::WrongState(TableState::Running))
        ));
    }

    #[test]
    fn test_only_current_player_may_act() {
        let catalog = Catalog::standard();
        let mut table = lobby_table(&["Alice", "Bob"]);
        table.start(1, &catalog, 1, Utc::now()).expect("start");
        let clue = Action::Clue {
            player: 1,
            target: 0,
            clue: Clue::Rank(1),
        };
        assert!(matches!(
            table.perform(2, clue, &StandardRules, Utc::now()),
            Err(TableError::NotYourTurn(2))
        ));

        let target = table.game().expect("game").players[0].hand[0].order;
        let play = Action::Play { player: 0, target };
        assert_eq!(
            table.perform(1, play, &StandardRules, Utc::now()).ok(),
            Some(TurnOutcome::Continue)
        );
        let game = table.game().expect("game");
        assert_eq!(game.turn, 1);
        assert_eq!(game.active_player, 1);
        assert_eq!(game.turn_actions.len(), 1);
    }

    #[test]
    fn test_terminate_moves_to_ending() {
        let catalog = Catalog::standard();
        let mut table = lobby_table(&["Alice", "Bob", "Cathy"]);
        table.start(1, &catalog, 1, Utc::now()).expect("start");
        table.terminate(3).expect("terminate");
        assert_eq!(table.state, TableState::Ending);
        let game = table.game().expect("game");
        assert_eq!(game.end_condition, EndCondition::Terminated);
        assert_eq!(game.end_player, 2);
    }

    #[test]
    fn test_last_lobby_player_leaving_deletes_table() {
        let mut table = lobby_table(&["Alice", "Bob"]);
        table.leave(1).expect("owner leaves");
        assert_eq!(table.owner, 2);
        table.leave(2).expect("last player leaves");
        assert!(table.is_deleted());
        assert!(matches!(table.leave(2), Err(TableError::Deleted(1))));
        assert!(matches!(
            table.add_tag(2, "x".to_string()),
            Err(TableError::Deleted(1))
        ));
    }

    #[test]
    fn test_idle_lobby_is_deleted() {
        let mut table = lobby_table(&["Alice", "Bob"]);
        assert!(!table.idle_timeout().expect("idle"));
        assert!(table.is_deleted());
    }

    #[test]
    fn test_notes_during_play_go_to_the_game_player() {
        let catalog = Catalog::standard();
        let mut table = lobby_table(&["Alice", "Bob"]);
        table.start(1, &catalog, 1, Utc::now()).expect("start");
        table.set_note(2, 3, "chop".to_string()).expect("note");
        assert!(matches!(
            table.set_note(2, 500, "x".to_string()),
            Err(TableError::InvalidNote(500))
        ));
        let notes = table.note_list();
        assert_eq!(notes[1].name, "Bob");
        assert_eq!(notes[1].notes[3], "chop");
    }

    #[test]
    fn test_replay_belongs_to_its_spectators() {
        let catalog = Catalog::standard();
        let (alice, _alice_rx) = Session::new(1, "Alice");
        let (bob, _bob_rx) = Session::new(2, "Bob");
        let (cathy, cathy_rx) = Session::new(3, "Cathy");
        let mut table = Table::new(1, "test".to_string(), alice, GameOptions::default());
        table.join(bob).expect("join");
        table.join(cathy).expect("join");
        table.start(1, &catalog, 1, Utc::now()).expect("start");
        table.terminate(1).expect("terminate");
        table.transition(TableState::Replay).expect("replay");
        drop(cathy_rx);

        let sessions = table.seat_players_as_spectators();
        assert_eq!(sessions.len(), 2);
        let game = table.game().expect("game");
        assert!(table
            .spectators
            .iter()
            .all(|s| s.notes.len() == game.deck.len() + game.num_suits));
        assert!(!table.is_member(3));
        assert_eq!(table.sessions().count(), 2);

        table.leave(2).expect("leave");
        assert!(!table.is_member(2));
        assert_eq!(table.sessions().map(|s| s.user_id).collect_vec(), vec![1]);
        assert!(matches!(
            table.add_chat(2, "hi".to_string(), Utc::now()),
            Err(TableError::NotAtTable(2))
        ));
    }
}

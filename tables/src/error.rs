use database::DatabaseError;
use thiserror::Error;
use types::GameError;

use crate::table::TableState;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table {0} has been deleted")]
    Deleted(u64),

    #[error("Table {0} is closed")]
    Closed(u64),

    #[error("Table {0} does not exist")]
    NotFound(u64),

    #[error("Operation not allowed while the table is {0:?}")]
    WrongState(TableState),

    #[error("Only the table owner may do that")]
    NotOwner,

    #[error("Only the replay leader may do that")]
    NotLeader,

    #[error("User {0} is not at this table")]
    NotAtTable(i64),

    #[error("User {0} is already at this table")]
    AlreadyJoined(i64),

    #[error("The table is full")]
    TableFull,

    #[error("A game needs between 2 and 6 players, not {0}")]
    PlayerCount(usize),

    #[error("It is not user {0}'s turn")]
    NotYourTurn(i64),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Invalid note index {0}")]
    InvalidNote(usize),

    #[error("Invalid replay turn {0}")]
    InvalidTurn(usize),

    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, Error)]
pub enum EndGameError {
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("The character {0} does not exist in the character table")]
    UnknownCharacter(String),

    #[error("Table has no game to end")]
    NoGame,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Failed to {step}: {source}")]
    Persistence {
        step: &'static str,
        #[source]
        source: DatabaseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    BestEffort,
}

use database::GameHistoryRecord;
use serde::Serialize;
use types::Action;

use crate::{session::Status, table::TableState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub id: u64,
    pub name: String,
    pub owner: i64,
    pub state: TableState,
    pub variant: String,
    pub players: Vec<String>,
    pub spectators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteListEntry {
    pub name: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    GameStart {
        table_id: u64,
    },
    GameAction {
        table_id: u64,
        action: Action,
    },
    Turn {
        table_id: u64,
        turn: usize,
        current_player_index: Option<usize>,
    },
    GameOver {
        table_id: u64,
    },
    Reveal {
        suit: usize,
        rank: usize,
        order: usize,
    },
    Connected {
        table_id: u64,
        list: Vec<bool>,
    },
    Spectators {
        table_id: u64,
        names: Vec<String>,
    },
    ReplayLeader {
        table_id: u64,
        leader: i64,
        play_animation: bool,
    },
    ReplayTurn {
        table_id: u64,
        turn: usize,
    },
    NoteList {
        table_id: u64,
        notes: Vec<NoteListEntry>,
    },
    DatabaseId {
        table_id: u64,
        id: i64,
    },
    GameHistory {
        games: Vec<GameHistoryRecord>,
    },
    Table {
        table: TableSummary,
    },
    TableGone {
        table_id: u64,
    },
    User {
        user_id: i64,
        name: String,
        status: Status,
        table_id: Option<u64>,
    },
    Chat {
        room: String,
        name: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::GameStart { .. } => "gameStart",
            ServerMessage::GameAction { .. } => "gameAction",
            ServerMessage::Turn { .. } => "turn",
            ServerMessage::GameOver { .. } => "gameOver",
            ServerMessage::Reveal { .. } => "reveal",
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Spectators { .. } => "spectators",
            ServerMessage::ReplayLeader { .. } => "replayLeader",
            ServerMessage::ReplayTurn { .. } => "replayTurn",
            ServerMessage::NoteList { .. } => "noteList",
            ServerMessage::DatabaseId { .. } => "databaseID",
            ServerMessage::GameHistory { .. } => "gameHistory",
            ServerMessage::Table { .. } => "table",
            ServerMessage::TableGone { .. } => "tableGone",
            ServerMessage::User { .. } => "user",
            ServerMessage::Chat { .. } => "chat",
        }
    }
}

//! Fan-out of outbound messages. Table-scoped notifications go to every live
//! connection seated at or watching a table; lobby-scoped ones go to every
//! online user. Offline users are skipped, nothing is queued for them.

use crate::{
    message::ServerMessage,
    session::{Session, SessionRegistry},
    table::Table,
};

pub const LOBBY_ROOM: &str = "lobby";

#[derive(Clone, Default)]
pub struct NotificationBus {
    sessions: SessionRegistry,
}

impl NotificationBus {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn broadcast(&self, table: &Table, message: ServerMessage) {
        for session in table.sessions() {
            session.emit(message.clone());
        }
    }

    pub fn notify_game_action(&self, table: &Table) {
        let Some(action) = table.game().and_then(|g| g.actions.last()) else {
            return;
        };
        self.broadcast(
            table,
            ServerMessage::GameAction {
                table_id: table.id,
                action: action.clone(),
            },
        );
    }

    pub fn notify_turn(&self, table: &Table) {
        let Some(game) = table.game() else { return };
        let current_player_index = (!game.is_over()).then_some(game.active_player);
        self.broadcast(
            table,
            ServerMessage::Turn {
                table_id: table.id,
                turn: game.turn,
                current_player_index,
            },
        );
    }

    pub fn notify_game_over(&self, table: &Table) {
        self.broadcast(table, ServerMessage::GameOver { table_id: table.id });
    }

    pub fn notify_connected(&self, table: &Table) {
        let list = table.players.iter().map(|p| p.present).collect();
        self.broadcast(
            table,
            ServerMessage::Connected {
                table_id: table.id,
                list,
            },
        );
    }

    pub fn notify_spectators(&self, table: &Table) {
        let names = table.spectators.iter().map(|s| s.name.clone()).collect();
        self.broadcast(
            table,
            ServerMessage::Spectators {
                table_id: table.id,
                names,
            },
        );
    }

    pub fn notify_replay_leader(&self, table: &Table, play_animation: bool) {
        for session in table.sessions() {
            Self::emit_replay_leader(session, table, play_animation);
        }
    }

    pub fn emit_replay_leader(session: &Session, table: &Table, play_animation: bool) {
        session.emit(ServerMessage::ReplayLeader {
            table_id: table.id,
            leader: table.owner,
            play_animation,
        });
    }

    pub fn notify_replay_turn(&self, table: &Table) {
        let Some(game) = table.game() else { return };
        self.broadcast(
            table,
            ServerMessage::ReplayTurn {
                table_id: table.id,
                turn: game.turn,
            },
        );
    }

    pub fn notify_note_list(&self, table: &Table) {
        for session in table.sessions() {
            Self::emit_note_list(session, table);
        }
    }

    pub fn emit_note_list(session: &Session, table: &Table) {
        session.emit(ServerMessage::NoteList {
            table_id: table.id,
            notes: table.note_list(),
        });
    }

    pub fn notify_table_chat(&self, table: &Table, name: &str, msg: &str) {
        self.broadcast(
            table,
            ServerMessage::Chat {
                room: table_room(table.id),
                name: name.to_string(),
                msg: msg.to_string(),
            },
        );
    }

    async fn broadcast_lobby(&self, message: ServerMessage) {
        for session in self.sessions.all().await {
            session.emit(message.clone());
        }
    }

    pub async fn notify_all_table(&self, table: &Table) {
        self.broadcast_lobby(ServerMessage::Table {
            table: table.summary(),
        })
        .await;
    }

    pub async fn notify_all_table_gone(&self, table_id: u64) {
        self.broadcast_lobby(ServerMessage::TableGone { table_id })
            .await;
    }

    pub async fn notify_all_user(&self, session: &Session) {
        self.broadcast_lobby(session.user_message()).await;
    }

    /// A system line in the lobby chat. Empty lines are not sent.
    pub async fn notify_lobby_chat(&self, msg: &str) {
        if msg.is_empty() {
            return;
        }
        self.broadcast_lobby(ServerMessage::Chat {
            room: LOBBY_ROOM.to_string(),
            name: String::new(),
            msg: msg.to_string(),
        })
        .await;
    }
}

pub fn table_room(table_id: u64) -> String {
    format!("table{table_id}")
}

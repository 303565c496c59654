//! Turns a finished table into a shared replay: players become spectators,
//! a leader is chosen and everyone is told about the new room.

use std::sync::Arc;

use types::EndCondition;

use crate::{
    bus::NotificationBus,
    end::EndOutcome,
    error::EndGameError,
    message::ServerMessage,
    session::{Session, Status},
    table::{Spectator, Table, TableState},
};

#[derive(Clone)]
pub struct ReplayConverter {
    bus: NotificationBus,
}

impl ReplayConverter {
    pub fn new(bus: NotificationBus) -> Self {
        Self { bus }
    }

    pub async fn convert(&self, table: &mut Table) -> Result<EndOutcome, EndGameError> {
        let game = table.game.as_mut().ok_or(EndGameError::NoGame)?;
        let game_id = game.id.unwrap_or_default();
        let idle = game.end_condition == EndCondition::IdleTimeout;
        // The final turn only holds the timing announcements.
        game.end_turn = Some(game.turn);
        game.turn = game.turn.saturating_sub(1);
        let num_notes = game.deck.len() + game.num_suits;

        table.transition(TableState::Replay)?;
        table.name = format!("Shared replay for game #{game_id}");
        table.progress = 100;
        let prefix = table.log_prefix();

        let mut owner_offline = false;
        let mut spectators = Vec::new();
        for player in &table.players {
            if !player.present {
                if player.user_id == table.owner && player.is_offline() {
                    log::info!(
                        "{prefix}{} was the owner and is offline, passing the leader on",
                        player.name
                    );
                    owner_offline = true;
                }
                continue;
            }
            if idle {
                continue;
            }
            spectators.push(Spectator {
                user_id: player.user_id,
                name: player.name.clone(),
                session: player.session.clone(),
                notes: vec![String::new(); num_notes],
            });
            log::info!("{prefix}Converted {} to a spectator", player.name);
        }
        table.spectators.extend(spectators);

        if table.spectators.is_empty() {
            log::info!("{prefix}Nobody is left to watch, deleting");
            table.transition(TableState::Deleted)?;
            return Ok(EndOutcome::Deleted);
        }

        if owner_offline {
            elect_leader(table);
        }

        for player in table.players.iter_mut() {
            player.present = true;
        }
        self.bus.notify_connected(table);

        let sessions: Vec<Arc<Session>> = table
            .spectators
            .iter()
            .filter_map(|s| s.session.clone())
            .filter(|s| !s.is_closed())
            .collect();
        for session in sessions {
            session.set_status(Status::SharedReplay, Some(table.id));
            self.bus.notify_all_user(&session).await;
            NotificationBus::emit_replay_leader(&session, table, false);
            NotificationBus::emit_note_list(&session, table);
            session.emit(ServerMessage::DatabaseId {
                table_id: table.id,
                id: game_id,
            });
        }

        self.bus.notify_all_table(table).await;
        self.bus.notify_spectators(table);
        Ok(EndOutcome::Replay)
    }
}

/// The first connected player in seat order, otherwise the first spectator.
pub fn elect_leader(table: &mut Table) {
    let leader = table
        .players
        .iter()
        .find(|p| p.present && !p.is_offline())
        .map(|p| (p.user_id, p.name.clone()))
        .or_else(|| {
            table
                .spectators
                .first()
                .map(|s| (s.user_id, s.name.clone()))
        });
    if let Some((user_id, name)) = leader {
        log::info!("{}Set the new leader to be {name}", table.log_prefix());
        table.owner = user_id;
    }
}

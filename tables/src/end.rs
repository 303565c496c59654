//! The ordered steps run once a game reaches its end condition: finalise,
//! announce, reveal, persist, report history and hand over to the replay
//! converter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{DatabaseError, GameHistoryRecord, GameRow, PersistenceGateway};
use itertools::Itertools;
use types::{Action, Catalog, Game};

use crate::{
    bus::{table_room, NotificationBus},
    error::{EndGameError, Severity, TableError},
    message::ServerMessage,
    replay::ReplayConverter,
    session::Status,
    stats::{fold_user_stats, fold_variant_stats, GameResult},
    table::{Table, TableState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// A replay being re-played; nothing was announced or stored.
    Skipped,
    Replay,
    Deleted,
}

/// Games on the same seed before this one. The stored count includes the
/// game just written.
fn prior_games(count: i64) -> i64 {
    (count - 1).max(0)
}

/// Logs a failed persistence step and decides whether the sequence goes on.
/// `Ok(None)` means a best-effort step failed and was skipped.
fn check<T>(
    step: &'static str,
    severity: Severity,
    result: Result<T, DatabaseError>,
) -> Result<Option<T>, EndGameError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(source) => {
            log::error!("Failed to {step}: {source}");
            match severity {
                Severity::BestEffort => Ok(None),
                Severity::Fatal => Err(EndGameError::Persistence { step, source }),
            }
        }
    }
}

pub struct GameEndSequencer {
    gateway: Arc<dyn PersistenceGateway>,
    bus: NotificationBus,
    catalog: Arc<Catalog>,
    converter: ReplayConverter,
}

impl GameEndSequencer {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        bus: NotificationBus,
        catalog: Arc<Catalog>,
    ) -> Self {
        let converter = ReplayConverter::new(bus.clone());
        Self {
            gateway,
            bus,
            catalog,
            converter,
        }
    }

    fn game_mut(table: &mut Table) -> Result<&mut Game, EndGameError> {
        table.game.as_mut().ok_or(EndGameError::NoGame)
    }

    fn append_and_broadcast(&self, table: &mut Table, action: Action) -> Result<(), EndGameError> {
        Self::game_mut(table)?.append_action(action)?;
        self.bus.notify_game_action(table);
        Ok(())
    }

    /// Must run exactly once per game; the table must be `Ending`.
    pub async fn end(
        &self,
        table: &mut Table,
        now: DateTime<Utc>,
    ) -> Result<EndOutcome, EndGameError> {
        if table.state != TableState::Ending {
            return Err(TableError::WrongState(table.state).into());
        }
        let prefix = table.log_prefix();

        let game = Self::game_mut(table)?;
        game.finalize(now);
        log::info!("{prefix}Ended with a score of {}", game.score);
        let deck_order = game.deck_order_action();
        let replay_mode = game.options.replay;
        self.append_and_broadcast(table, deck_order)?;

        if replay_mode {
            table.transition(TableState::Replay)?;
            let sessions = table.seat_players_as_spectators();
            if table.spectators.is_empty() {
                log::info!("{prefix}Nobody is left to watch, deleting");
                table.transition(TableState::Deleted)?;
                return Ok(EndOutcome::Deleted);
            }
            if table.spectator_of(table.owner).is_none() {
                table.owner = table.spectators[0].user_id;
            }
            for session in sessions {
                session.set_status(Status::SharedReplay, Some(table.id));
                self.bus.notify_all_user(&session).await;
            }
            self.bus.notify_spectators(table);
            return Ok(EndOutcome::Skipped);
        }

        let game = Self::game_mut(table)?;
        let mut texts = game.player_time_announcements();
        texts.push(game.duration_announcement());
        for text in texts {
            log::info!("{prefix}{text}");
            self.append_and_broadcast(table, Action::Text { text })?;
        }

        Self::game_mut(table)?.turn += 1;
        self.bus.notify_turn(table);
        self.bus.notify_game_over(table);
        self.reveal_hands(table);

        self.bus.notify_all_table_gone(table.id).await;
        let sessions = table
            .players
            .iter()
            .filter_map(|p| p.session.clone())
            .collect_vec();
        for session in sessions {
            session.set_status(Status::Lobby, None);
            self.bus.notify_all_user(&session).await;
        }

        let game_id = self.write_database(table).await?;

        let count = check(
            "count the games on this seed",
            Severity::Fatal,
            self.gateway
                .get_num_similar_by_seed(&Self::game_mut(table)?.seed)
                .await,
        )?
        .unwrap_or_default();
        let history = self.history_record(table, game_id, prior_games(count))?;
        for session in table.players.iter().filter_map(|p| p.session.as_ref()) {
            session.emit(ServerMessage::GameHistory {
                games: vec![history.clone()],
            });
        }

        let announcement = table.game().map(Game::announcement_string).unwrap_or_default();
        self.bus.notify_lobby_chat(&announcement).await;

        self.converter.convert(table).await
    }

    fn reveal_hands(&self, table: &Table) {
        let Some(game) = table.game() else { return };
        for game_player in &game.players {
            let Some(player) = table.players.get(game_player.index) else {
                continue;
            };
            let Some(session) = player.session.as_ref().filter(|_| player.present) else {
                continue;
            };
            for card in &game_player.hand {
                session.emit(ServerMessage::Reveal {
                    suit: card.suit,
                    rank: card.rank,
                    order: card.order,
                });
            }
        }
    }

    fn history_record(
        &self,
        table: &Table,
        id: i64,
        num_similar: i64,
    ) -> Result<GameHistoryRecord, EndGameError> {
        let game = table.game().ok_or(EndGameError::NoGame)?;
        let options = &game.options;
        Ok(GameHistoryRecord {
            id,
            num_players: game.players.len(),
            variant: options.variant.clone(),
            timed: options.timed,
            time_base: options.time_base,
            time_per_turn: options.time_per_turn,
            speedrun: options.speedrun,
            card_cycle: options.card_cycle,
            deck_plays: options.deck_plays,
            empty_clues: options.empty_clues,
            character_assignments: options.character_assignments,
            seed: game.seed.clone(),
            score: game.score,
            num_turns: game.turn,
            end_condition: game.end_condition,
            datetime_started: game.datetime_started,
            datetime_finished: game.datetime_finished.unwrap_or(game.datetime_started),
            num_similar,
            player_names: table.players.iter().map(|p| p.name.as_str()).sorted().join(", "),
            increment_num_games: true,
        })
    }

    /// Character ids for each seat: 0 without character assignments, -1 for a
    /// seat that drew no character.
    fn character_ids(&self, game: &Game) -> Result<Vec<i32>, EndGameError> {
        game.players
            .iter()
            .map(|p| {
                if !game.options.character_assignments {
                    return Ok(0);
                }
                match p.character.as_deref() {
                    None | Some("n/a") => Ok(-1),
                    Some(name) => self
                        .catalog
                        .character(name)
                        .map(|c| c.id)
                        .ok_or_else(|| EndGameError::UnknownCharacter(name.to_string())),
                }
            })
            .collect()
    }

    /// Writes the game, its participants, notes, actions, chat and tags, then
    /// folds the result into the statistics. Returns the new game id.
    async fn write_database(&self, table: &mut Table) -> Result<i64, EndGameError> {
        let prefix = table.log_prefix();
        let table_name = table.name.clone();
        let user_ids = table.players.iter().map(|p| p.user_id).collect_vec();
        let chat = table
            .chat
            .iter()
            .map(|c| (c.user_id, c.msg.clone()))
            .collect_vec();
        let tags = table.tags.iter().cloned().collect_vec();
        let room = table_room(table.id);

        let game = Self::game_mut(table)?;
        let variant = self
            .catalog
            .variant(&game.options.variant)
            .ok_or_else(|| EndGameError::UnknownVariant(game.options.variant.clone()))?;
        let variant_id = variant.id;
        let character_ids = self.character_ids(game)?;

        let row = GameRow {
            name: table_name,
            num_players: game.players.len(),
            variant_id,
            timed: game.options.timed,
            time_base: game.options.time_base,
            time_per_turn: game.options.time_per_turn,
            speedrun: game.options.speedrun,
            card_cycle: game.options.card_cycle,
            deck_plays: game.options.deck_plays,
            empty_clues: game.options.empty_clues,
            character_assignments: game.options.character_assignments,
            seed: game.seed.clone(),
            score: game.score,
            num_turns: game.turn,
            end_condition: game.end_condition,
            datetime_started: game.datetime_started,
            datetime_finished: game.datetime_finished.unwrap_or(game.datetime_started),
        };
        let gateway = &self.gateway;
        let game_id = check(
            "insert the game row",
            Severity::Fatal,
            gateway.insert_game(&row).await,
        )?
        .unwrap_or_default();
        game.mark_archived(game_id);

        for (game_player, character_id) in game.players.iter().zip(character_ids) {
            let user_id = user_ids[game_player.index];
            check(
                "insert a game participant row",
                Severity::Fatal,
                gateway
                    .insert_participant(
                        game_id,
                        user_id,
                        game_player.index,
                        character_id,
                        game_player.character_metadata,
                    )
                    .await,
            )?;
        }

        for game_player in &game.players {
            let user_id = user_ids[game_player.index];
            for (order, note) in game_player.notes.iter().enumerate() {
                if note.is_empty() {
                    continue;
                }
                check(
                    "insert a note",
                    Severity::BestEffort,
                    gateway.insert_note(user_id, game_id, order, note).await,
                )?;
            }
        }

        for (turn, action) in game.turn_actions.iter().enumerate() {
            check(
                "insert an action row",
                Severity::Fatal,
                gateway.insert_action(game_id, turn, action).await,
            )?;
        }
        if let Some(game_over) = game.game_over_action() {
            check(
                "insert the game over action",
                Severity::Fatal,
                gateway
                    .insert_action(game_id, game.turn_actions.len(), &game_over)
                    .await,
            )?;
        }

        for (user_id, msg) in &chat {
            check(
                "insert a chat message",
                Severity::BestEffort,
                gateway.insert_chat_message(*user_id, msg, &room).await,
            )?;
        }
        for tag in &tags {
            check(
                "insert a tag",
                Severity::BestEffort,
                gateway.insert_tag(game_id, tag).await,
            )?;
        }

        let result = GameResult::from_game(game);
        for user_id in &user_ids {
            let mut stats = check(
                "get the user stats",
                Severity::Fatal,
                gateway.get_user_stats(*user_id, variant_id).await,
            )?
            .unwrap_or_default();
            if fold_user_stats(&mut stats, &result) {
                log::info!("{prefix}New best score for user {user_id}");
            }
            check(
                "update the user stats",
                Severity::BestEffort,
                gateway.update_user_stats(*user_id, variant_id, &stats).await,
            )?;
        }

        let mut stats = check(
            "get the variant stats",
            Severity::Fatal,
            gateway.get_variant_stats(variant_id).await,
        )?
        .unwrap_or_default();
        fold_variant_stats(&mut stats, &result);
        check(
            "update the variant stats",
            Severity::Fatal,
            gateway.update_variant_stats(variant_id, &stats).await,
        )?;

        log::info!("{prefix}Finished database actions for game {game_id}");
        Ok(game_id)
    }
}

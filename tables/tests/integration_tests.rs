//! End-to-end table scenarios against the in-memory gateway. Every client's
//! outbound messages are captured from its session channel.

use std::sync::Arc;

use database::{FailPoint, MemoryGateway};
use tables::{
    ServerConfig, ServerContext, ServerMessage, Session, TableError, TableHandle, TableState,
};
use tokio::sync::mpsc::UnboundedReceiver;
use types::{game::GameError, Action, Catalog, EndCondition, Game, GameOptions, RulesEngine};

/// Every play scores a point and the game ends normally after `last_turn` turns.
#[derive(Debug)]
struct ScriptedRules {
    last_turn: usize,
}

impl RulesEngine for ScriptedRules {
    fn apply(&self, game: &mut Game, _player: usize, action: &Action) -> Result<(), GameError> {
        match action {
            Action::Play { .. } => game.score += 1,
            Action::Discard { .. } | Action::Clue { .. } => {}
            other => return Err(GameError::NotATurnAction(other.type_name())),
        }
        Ok(())
    }

    fn end_condition(&self, game: &Game) -> Option<EndCondition> {
        (game.turn >= self.last_turn).then_some(EndCondition::Normal)
    }
}

struct Client {
    session: Arc<Session>,
    rx: UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn user_id(&self) -> i64 {
        self.session.user_id
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

fn event_names(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(ServerMessage::event_name).collect()
}

fn position(names: &[&str], event: &str) -> usize {
    names
        .iter()
        .position(|n| *n == event)
        .unwrap_or_else(|| panic!("no {event} in {names:?}"))
}

struct Harness {
    ctx: Arc<ServerContext>,
    gateway: Arc<MemoryGateway>,
}

impl Harness {
    fn new(last_turn: usize) -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        let ctx = ServerContext::with_rules(
            ServerConfig::default(),
            Catalog::standard(),
            gateway.clone(),
            Arc::new(ScriptedRules { last_turn }),
        );
        Self { ctx, gateway }
    }

    async fn connect(&self, user_id: i64, name: &str) -> Client {
        let (session, rx) = Session::new(user_id, name);
        self.ctx.sessions.register(session.clone()).await;
        Client { session, rx }
    }

    /// Seats everyone at a new table owned by the first client and starts on seed 7.
    async fn start_table(&self, clients: &[Client], options: GameOptions) -> TableHandle {
        let table = self
            .ctx
            .create_table(clients[0].session.clone(), "test".to_string(), options)
            .await
            .expect("table created");
        for client in &clients[1..] {
            table.join(client.session.clone()).await.expect("joined");
        }
        table
            .start(clients[0].user_id(), Some(7))
            .await
            .expect("started");
        table
    }

    async fn three_players(&self, first_id: i64) -> Vec<Client> {
        vec![
            self.connect(first_id, "Alice").await,
            self.connect(first_id + 1, "Bob").await,
            self.connect(first_id + 2, "Cathy").await,
        ]
    }
}

async fn play_turns(table: &TableHandle, clients: &[Client], turns: usize) -> TableState {
    let mut state = TableState::Running;
    for turn in 0..turns {
        let seat = turn % clients.len();
        state = table
            .perform(
                clients[seat].user_id(),
                Action::Play {
                    player: seat,
                    target: 0,
                },
            )
            .await
            .expect("turn accepted");
    }
    state
}

fn history(messages: &[ServerMessage]) -> Option<database::GameHistoryRecord> {
    messages.iter().find_map(|m| match m {
        ServerMessage::GameHistory { games } => {
            assert_eq!(games.len(), 1);
            games.first().cloned()
        }
        _ => None,
    })
}

#[tokio::test]
async fn test_normal_game_becomes_shared_replay() {
    let harness = Harness::new(20);
    let mut lobby = harness.connect(99, "Watcher").await;
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    clients.iter_mut().for_each(|c| {
        c.drain();
    });
    lobby.drain();

    let state = play_turns(&table, &clients, 20).await;
    assert_eq!(state, TableState::Replay);

    let stored = harness.gateway.snapshot().await;
    assert_eq!(stored.games.len(), 1);
    let (game_id, row) = &stored.games[0];
    assert_eq!(row.end_condition, EndCondition::Normal);
    assert_eq!(row.score, 20);
    assert_eq!(row.num_turns, 21);
    assert_eq!(row.seed, "p3v0s7");
    assert_eq!(stored.participants.len(), 3);
    let actions = stored.actions_for(*game_id);
    assert_eq!(actions.len(), 20);
    assert!(actions.iter().all(|(_, a)| a.is_turn_action()));

    let messages = clients[1].drain();
    let record = history(&messages).expect("game history sent");
    assert_eq!(record.score, 20);
    assert_eq!(record.num_turns, 21);
    assert_eq!(record.num_similar, 0);
    assert_eq!(record.player_names, "Alice, Bob, Cathy");
    assert_eq!(record.end_condition, EndCondition::Normal);

    let names = event_names(&messages);
    assert!(position(&names, "turn") < position(&names, "gameOver"));
    assert!(position(&names, "gameOver") < position(&names, "reveal"));
    assert!(position(&names, "reveal") < position(&names, "gameHistory"));
    assert!(position(&names, "gameHistory") < position(&names, "databaseID"));
    assert!(messages.contains(&ServerMessage::DatabaseId {
        table_id: table.id,
        id: *game_id,
    }));
    assert!(messages.contains(&ServerMessage::ReplayLeader {
        table_id: table.id,
        leader: 1,
        play_animation: false,
    }));

    let lobby_messages = lobby.drain();
    assert!(lobby_messages.contains(&ServerMessage::TableGone { table_id: table.id }));
    assert!(lobby_messages.contains(&ServerMessage::Chat {
        room: "lobby".to_string(),
        name: String::new(),
        msg: "[Alice, Bob, Cathy] finished a No Variant game with a score of 20. (id: 1, seed: 7)"
            .to_string(),
    }));

    let snapshot = table.snapshot().await.expect("table still open");
    assert_eq!(snapshot.name, format!("Shared replay for game #{game_id}"));
    assert_eq!(snapshot.spectators.len(), 3);
    assert!(snapshot.spectators.iter().all(|s| s.notes.len() == 50 + 5));
    assert_eq!(snapshot.owner, 1);
    let game = snapshot.game.expect("game kept for the replay");
    assert_eq!(game.end_turn, Some(21));
    assert_eq!(game.turn, 20);
    assert!(game.is_archived());
    for client in &clients {
        assert_eq!(client.session.status(), tables::Status::SharedReplay);
        assert_eq!(client.session.table_id(), Some(table.id));
    }
}

#[tokio::test]
async fn test_end_announcements_are_logged_before_the_game_over() {
    let harness = Harness::new(3);
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    clients[0].drain();
    play_turns(&table, &clients, 3).await;

    let actions: Vec<Action> = clients[0]
        .drain()
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::GameAction { action, .. } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(actions.len(), 3 + 1 + 3 + 1);
    assert!(matches!(actions[3], Action::DeckOrder { ref deck } if deck.len() == 50));
    match &actions[4] {
        Action::Text { text } => assert!(text.starts_with("Alice took: ")),
        other => panic!("unexpected action {other:?}"),
    }
    match &actions[7] {
        Action::Text { text } => assert!(text.starts_with("The total game duration was: ")),
        other => panic!("unexpected action {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_timeout_deletes_the_table() {
    let harness = Harness::new(100);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    play_turns(&table, &clients, 4).await;

    let state = table.idle_timeout().await.expect("idle timeout handled");
    assert_eq!(state, TableState::Deleted);

    let stored = harness.gateway.snapshot().await;
    let (game_id, row) = &stored.games[0];
    assert_eq!(row.end_condition, EndCondition::IdleTimeout);
    assert_eq!(row.score, 0);
    let actions = stored.actions_for(*game_id);
    assert_eq!(actions.len(), 5);
    assert_eq!(
        actions[4],
        (
            4,
            Action::GameOver {
                target: 0,
                value: EndCondition::IdleTimeout
            }
        )
    );

    assert!(matches!(
        table.snapshot().await,
        Err(TableError::Closed(_))
    ));
    assert!(!harness.ctx.tables.contains(table.id).await);
    assert!(matches!(
        harness.ctx.table(table.id).await,
        Err(TableError::NotFound(_))
    ));
    for client in &clients {
        assert_eq!(client.session.status(), tables::Status::Lobby);
    }
}

#[tokio::test]
async fn test_second_game_on_a_seed_reports_one_similar() {
    let harness = Harness::new(2);
    let mut first = harness.three_players(1).await;
    let table = harness.start_table(&first, GameOptions::default()).await;
    play_turns(&table, &first, 2).await;
    assert_eq!(history(&first[0].drain()).map(|h| h.num_similar), Some(0));

    let mut second = harness.three_players(11).await;
    let table = harness.start_table(&second, GameOptions::default()).await;
    play_turns(&table, &second, 2).await;
    let record = history(&second[0].drain()).expect("history sent");
    assert_eq!(record.seed, "p3v0s7");
    assert_eq!(record.num_similar, 1);
}

#[tokio::test]
async fn test_offline_owner_passes_leadership_to_next_present_player() {
    let harness = Harness::new(3);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table.disconnect(1).await.expect("owner drops");
    play_turns(&table, &clients, 3).await;

    let snapshot = table.snapshot().await.expect("replay open");
    assert_eq!(snapshot.state, TableState::Replay);
    assert_eq!(snapshot.owner, 2);
    let spectators: Vec<i64> = snapshot.spectators.iter().map(|s| s.user_id).collect();
    assert_eq!(spectators, vec![2, 3]);
    assert!(snapshot.players.iter().all(|p| p.present));
}

#[tokio::test]
async fn test_leader_election_skips_closed_connections() {
    let harness = Harness::new(3);
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table.disconnect(1).await.expect("owner drops");
    // Bob's connection dies without the table hearing about it
    let bob = clients.remove(1);
    let bob_session = bob.session.clone();
    drop(bob);
    assert!(bob_session.is_closed());

    for (user_id, seat) in [(1, 0), (2, 1), (3, 2)] {
        table
            .perform(user_id, Action::Play { player: seat, target: 0 })
            .await
            .expect("turn");
    }
    let snapshot = table.snapshot().await.expect("replay open");
    assert_eq!(snapshot.owner, 3);
}

#[tokio::test]
async fn test_leader_falls_back_to_first_spectator_without_live_players() {
    let harness = Harness::new(2);
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table.disconnect(1).await.expect("owner drops");
    let bob = clients.remove(1);
    let cathy = clients.remove(1);
    let sessions = [bob.session.clone(), cathy.session.clone()];
    drop(bob);
    drop(cathy);
    assert!(sessions.iter().all(|s| s.is_closed()));

    for (user_id, seat) in [(1, 0), (2, 1)] {
        table
            .perform(user_id, Action::Play { player: seat, target: 0 })
            .await
            .expect("turn");
    }
    let snapshot = table.snapshot().await.expect("replay open");
    assert_eq!(snapshot.state, TableState::Replay);
    assert_eq!(snapshot.spectators[0].user_id, 2);
    assert_eq!(snapshot.owner, 2);
}

#[tokio::test]
async fn test_owner_in_lobby_keeps_leadership() {
    let harness = Harness::new(2);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table
        .step_away(clients[0].session.clone())
        .await
        .expect("owner steps away");
    play_turns(&table, &clients, 2).await;

    let snapshot = table.snapshot().await.expect("replay open");
    assert_eq!(snapshot.owner, 1);
    assert_eq!(snapshot.spectators.len(), 2);
}

#[tokio::test]
async fn test_replay_without_spectators_is_deleted() {
    let harness = Harness::new(1);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    for client in &clients[1..] {
        table
            .step_away(client.session.clone())
            .await
            .expect("step away");
    }
    table.step_away(clients[0].session.clone()).await.expect("step away");

    let state = table
        .perform(1, Action::Play { player: 0, target: 0 })
        .await
        .expect("last turn");
    assert_eq!(state, TableState::Deleted);
    assert_eq!(harness.gateway.snapshot().await.games.len(), 1);
    assert!(matches!(table.summary().await, Err(TableError::Closed(_))));
}

#[tokio::test]
async fn test_replay_game_only_reveals_the_deck() {
    let harness = Harness::new(1);
    let mut clients = harness.three_players(1).await;
    let options = GameOptions {
        replay: true,
        ..GameOptions::default()
    };
    let table = harness.start_table(&clients, options).await;
    clients[0].drain();

    let state = table
        .perform(1, Action::Play { player: 0, target: 0 })
        .await
        .expect("turn");
    assert_eq!(state, TableState::Replay);

    let names = event_names(&clients[0].drain());
    assert_eq!(
        names,
        vec!["gameAction", "gameAction", "user", "user", "user", "spectators"]
    );
    let stored = harness.gateway.snapshot().await;
    assert!(stored.games.is_empty());
    assert!(stored.user_stats.is_empty());
    assert!(stored.variant_stats.is_empty());
}

#[tokio::test]
async fn test_players_can_leave_a_finished_replay_game() {
    let harness = Harness::new(1);
    let clients = harness.three_players(1).await;
    let options = GameOptions {
        replay: true,
        ..GameOptions::default()
    };
    let table = harness.start_table(&clients, options).await;
    table
        .perform(1, Action::Play { player: 0, target: 0 })
        .await
        .expect("turn");

    let snapshot = table.snapshot().await.expect("replay open");
    let spectators: Vec<i64> = snapshot.spectators.iter().map(|s| s.user_id).collect();
    assert_eq!(spectators, vec![1, 2, 3]);
    for client in &clients {
        assert_eq!(client.session.status(), tables::Status::SharedReplay);
    }

    table.leave(1).await.expect("owner leaves");
    assert_eq!(table.snapshot().await.expect("open").owner, 2);
    assert_eq!(clients[0].session.status(), tables::Status::Lobby);
    assert_eq!(clients[0].session.table_id(), None);
    harness
        .ctx
        .create_table(
            clients[0].session.clone(),
            "again".to_string(),
            GameOptions::default(),
        )
        .await
        .expect("free to open a new table");

    table.leave(2).await.expect("leave");
    table.leave(3).await.expect("last one out");
    assert!(matches!(table.summary().await, Err(TableError::Closed(_))));
    for client in &clients[1..] {
        assert_eq!(client.session.status(), tables::Status::Lobby);
        assert_eq!(client.session.table_id(), None);
    }
}

#[tokio::test]
async fn test_departed_spectator_hears_nothing_more() {
    let harness = Harness::new(3);
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    play_turns(&table, &clients, 3).await;

    table.leave(3).await.expect("Cathy leaves");
    clients[2].drain();

    table.set_replay_turn(1, 1).await.expect("leader moves");
    table.chat(1, "look here".to_string()).await.expect("chat");
    table.note(1, 0, "five".to_string()).await.expect("note");
    assert!(clients[2].drain().is_empty());
    assert!(clients[1]
        .drain()
        .contains(&ServerMessage::ReplayTurn {
            table_id: table.id,
            turn: 1
        }));

    assert!(matches!(
        table.chat(3, "still here?".to_string()).await,
        Err(TableError::NotAtTable(3))
    ));
    assert!(matches!(
        table.tag(3, "gone".to_string()).await,
        Err(TableError::NotAtTable(3))
    ));
}

#[tokio::test]
async fn test_fatal_write_failure_stops_before_history() {
    let harness = Harness::new(2);
    harness.gateway.fail_on(FailPoint::InsertAction).await;
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;

    let state = play_turns(&table, &clients, 2).await;
    assert_eq!(state, TableState::Deleted);

    let messages = clients[0].drain();
    let names = event_names(&messages);
    assert!(names.contains(&"gameOver"));
    assert!(!names.contains(&"gameHistory"));
    assert!(!names.contains(&"databaseID"));
    let stored = harness.gateway.snapshot().await;
    assert_eq!(stored.games.len(), 1);
    assert!(stored.variant_stats.is_empty());
}

#[tokio::test]
async fn test_variant_stats_failure_is_fatal() {
    let harness = Harness::new(2);
    harness.gateway.fail_on(FailPoint::UpdateVariantStats).await;
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    assert_eq!(play_turns(&table, &clients, 2).await, TableState::Deleted);
    assert!(history(&clients[0].drain()).is_none());
}

#[tokio::test]
async fn test_best_effort_failures_do_not_stop_the_sequence() {
    let harness = Harness::new(2);
    for point in [
        FailPoint::InsertNote,
        FailPoint::InsertChatMessage,
        FailPoint::InsertTag,
        FailPoint::UpdateUserStats,
    ] {
        harness.gateway.fail_on(point).await;
    }
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table.note(2, 4, "five".to_string()).await.expect("note");
    table.chat(3, "gl".to_string()).await.expect("chat");
    table.tag(1, "Practice ".to_string()).await.expect("tag");

    assert_eq!(play_turns(&table, &clients, 2).await, TableState::Replay);
    assert!(history(&clients[0].drain()).is_some());

    let stored = harness.gateway.snapshot().await;
    assert!(stored.notes.is_empty());
    assert!(stored.chat.is_empty());
    assert!(stored.tags.is_empty());
    assert!(stored.user_stats.is_empty());
    assert_eq!(stored.variant_stats.get(&0).map(|s| s.num_games), Some(1));
}

#[tokio::test]
async fn test_notes_chat_and_tags_are_stored() {
    let harness = Harness::new(2);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    table.note(2, 4, "five".to_string()).await.expect("note");
    table.note(2, 5, String::new()).await.expect("empty note");
    table.chat(3, "gl".to_string()).await.expect("chat");
    table.tag(1, "Practice ".to_string()).await.expect("tag");
    play_turns(&table, &clients, 2).await;

    let stored = harness.gateway.snapshot().await;
    assert_eq!(stored.notes.len(), 1);
    assert_eq!(stored.notes[0].user_id, 2);
    assert_eq!(stored.notes[0].card_order, 4);
    assert_eq!(stored.chat, vec![(3, "gl".to_string(), format!("table{}", table.id))]);
    assert_eq!(stored.tags, vec![(1, "practice".to_string())]);
    let stats = stored.user_stats.get(&(1, 0)).expect("user stats written");
    assert_eq!(stats.num_games, 1);
    assert_eq!(stats.best_scores[1].score, 2);
}

#[tokio::test]
async fn test_terminated_game_stores_game_over_action() {
    let harness = Harness::new(100);
    let clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    play_turns(&table, &clients, 2).await;

    let state = table.terminate(3).await.expect("terminated");
    assert_eq!(state, TableState::Replay);
    let stored = harness.gateway.snapshot().await;
    let (game_id, row) = &stored.games[0];
    assert_eq!(row.end_condition, EndCondition::Terminated);
    assert_eq!(row.score, 0);
    assert_eq!(
        stored.actions_for(*game_id).last(),
        Some(&(
            2,
            Action::GameOver {
                target: 2,
                value: EndCondition::Terminated
            }
        ))
    );
}

#[tokio::test]
async fn test_running_out_of_time_ends_with_timeout() {
    let harness = Harness::new(100);
    let clients = harness.three_players(1).await;
    let options = GameOptions {
        timed: true,
        time_base: 0,
        ..GameOptions::default()
    };
    let table = harness.start_table(&clients, options).await;
    let state = table
        .perform(1, Action::Play { player: 0, target: 0 })
        .await
        .expect("turn handled");
    assert_eq!(state, TableState::Replay);

    let stored = harness.gateway.snapshot().await;
    let (game_id, row) = &stored.games[0];
    assert_eq!(row.end_condition, EndCondition::Timeout);
    assert_eq!(
        stored.actions_for(*game_id),
        vec![(
            0,
            Action::GameOver {
                target: 0,
                value: EndCondition::Timeout
            }
        )]
    );
}

#[tokio::test]
async fn test_replay_navigation_and_leader_handover() {
    let harness = Harness::new(3);
    let mut clients = harness.three_players(1).await;
    let table = harness.start_table(&clients, GameOptions::default()).await;
    play_turns(&table, &clients, 3).await;
    clients.iter_mut().for_each(|c| {
        c.drain();
    });

    assert!(matches!(
        table.set_replay_turn(2, 1).await,
        Err(TableError::NotLeader)
    ));
    assert!(matches!(
        table.set_replay_turn(1, 99).await,
        Err(TableError::InvalidTurn(99))
    ));
    table.set_replay_turn(1, 1).await.expect("leader moves");
    assert!(clients[2]
        .drain()
        .contains(&ServerMessage::ReplayTurn {
            table_id: table.id,
            turn: 1
        }));

    table.transfer_leader(1, 3).await.expect("handover");
    assert_eq!(table.snapshot().await.expect("open").owner, 3);

    table.leave(3).await.expect("leader leaves");
    assert_eq!(table.snapshot().await.expect("open").owner, 1);
    table.leave(1).await.expect("leave");
    table.leave(2).await.expect("last spectator leaves");
    assert!(matches!(table.summary().await, Err(TableError::Closed(_))));
}

#[tokio::test]
async fn test_lobby_rules() {
    let harness = Harness::new(3);
    let clients = harness.three_players(1).await;
    let table = harness
        .ctx
        .create_table(
            clients[0].session.clone(),
            "lobby".to_string(),
            GameOptions::default(),
        )
        .await
        .expect("created");
    assert!(matches!(
        table.start(1, None).await,
        Err(TableError::PlayerCount(1))
    ));
    table.join(clients[1].session.clone()).await.expect("join");
    assert!(matches!(
        table.join(clients[1].session.clone()).await,
        Err(TableError::AlreadyJoined(2))
    ));
    assert!(matches!(
        table.start(2, None).await,
        Err(TableError::NotOwner)
    ));

    let others = [
        harness.connect(20, "Dee").await,
        harness.connect(21, "Eve").await,
        harness.connect(22, "Fay").await,
        harness.connect(23, "Gus").await,
        harness.connect(24, "Hal").await,
    ];
    for client in &others[..4] {
        table.join(client.session.clone()).await.expect("seat free");
    }
    assert!(matches!(
        table.join(others[4].session.clone()).await,
        Err(TableError::TableFull)
    ));

    assert_eq!(harness.ctx.tables.list().await.len(), 1);
    assert!(matches!(
        harness
            .ctx
            .create_table(
                others[4].session.clone(),
                "odd".to_string(),
                GameOptions {
                    variant: "Nonsense".to_string(),
                    ..GameOptions::default()
                }
            )
            .await,
        Err(TableError::UnknownVariant(_))
    ));

    table.start(1, None).await.expect("six players start");
    let snapshot = table.snapshot().await.expect("open");
    let game = snapshot.game.expect("game");
    assert!(game.players.iter().all(|p| p.hand.len() == 3));
    assert!(matches!(
        table.leave(2).await,
        Err(TableError::WrongState(TableState::Running))
    ));
}

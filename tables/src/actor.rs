//! Each table runs as its own task and owns its `Table` outright. Everything
//! else talks to it through a `TableHandle`, so commands for one table are
//! applied one at a time while different tables run side by side.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use types::Action;

use crate::{
    context::ServerContext,
    error::TableError,
    message::{ServerMessage, TableSummary},
    session::{Session, Status},
    table::{Table, TableState, TurnOutcome},
};

pub type Reply<T> = oneshot::Sender<Result<T, TableError>>;

pub enum TableCommand {
    Join {
        session: Arc<Session>,
        reply: Reply<()>,
    },
    Leave {
        user_id: i64,
        reply: Reply<()>,
    },
    Start {
        user_id: i64,
        seed: Option<u64>,
        reply: Reply<()>,
    },
    Perform {
        user_id: i64,
        action: Action,
        reply: Reply<TableState>,
    },
    Terminate {
        user_id: i64,
        reply: Reply<TableState>,
    },
    IdleTimeout {
        reply: Reply<TableState>,
    },
    SetPresence {
        user_id: i64,
        session: Option<Arc<Session>>,
        present: bool,
        reply: Reply<()>,
    },
    Note {
        user_id: i64,
        order: usize,
        text: String,
        reply: Reply<()>,
    },
    Chat {
        user_id: i64,
        msg: String,
        reply: Reply<()>,
    },
    Tag {
        user_id: i64,
        tag: String,
        reply: Reply<()>,
    },
    ReplayTurn {
        user_id: i64,
        turn: usize,
        reply: Reply<()>,
    },
    TransferLeader {
        user_id: i64,
        new_leader: i64,
        reply: Reply<()>,
    },
    Summary {
        reply: Reply<TableSummary>,
    },
    Snapshot {
        reply: Reply<Table>,
    },
}

#[derive(Clone, Debug)]
pub struct TableHandle {
    pub id: u64,
    tx: mpsc::Sender<TableCommand>,
}

impl TableHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> TableCommand,
    ) -> Result<T, TableError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| TableError::Closed(self.id))?;
        rx.await.map_err(|_| TableError::Closed(self.id))?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(&self, session: Arc<Session>) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Join { session, reply })
            .await
    }

    pub async fn leave(&self, user_id: i64) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Leave { user_id, reply })
            .await
    }

    pub async fn start(&self, user_id: i64, seed: Option<u64>) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Start {
            user_id,
            seed,
            reply,
        })
        .await
    }

    /// Returns the table state once the action, and any end sequence it
    /// triggered, has finished.
    pub async fn perform(&self, user_id: i64, action: Action) -> Result<TableState, TableError> {
        self.request(|reply| TableCommand::Perform {
            user_id,
            action,
            reply,
        })
        .await
    }

    pub async fn terminate(&self, user_id: i64) -> Result<TableState, TableError> {
        self.request(|reply| TableCommand::Terminate { user_id, reply })
            .await
    }

    pub async fn idle_timeout(&self) -> Result<TableState, TableError> {
        self.request(|reply| TableCommand::IdleTimeout { reply })
            .await
    }

    pub async fn disconnect(&self, user_id: i64) -> Result<(), TableError> {
        self.request(|reply| TableCommand::SetPresence {
            user_id,
            session: None,
            present: false,
            reply,
        })
        .await
    }

    pub async fn reconnect(&self, session: Arc<Session>) -> Result<(), TableError> {
        self.request(|reply| TableCommand::SetPresence {
            user_id: session.user_id,
            session: Some(session),
            present: true,
            reply,
        })
        .await
    }

    pub async fn step_away(&self, session: Arc<Session>) -> Result<(), TableError> {
        self.request(|reply| TableCommand::SetPresence {
            user_id: session.user_id,
            session: Some(session),
            present: false,
            reply,
        })
        .await
    }

    pub async fn note(&self, user_id: i64, order: usize, text: String) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Note {
            user_id,
            order,
            text,
            reply,
        })
        .await
    }

    pub async fn chat(&self, user_id: i64, msg: String) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Chat {
            user_id,
            msg,
            reply,
        })
        .await
    }

    pub async fn tag(&self, user_id: i64, tag: String) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Tag {
            user_id,
            tag,
            reply,
        })
        .await
    }

    pub async fn set_replay_turn(&self, user_id: i64, turn: usize) -> Result<(), TableError> {
        self.request(|reply| TableCommand::ReplayTurn {
            user_id,
            turn,
            reply,
        })
        .await
    }

    pub async fn transfer_leader(&self, user_id: i64, new_leader: i64) -> Result<(), TableError> {
        self.request(|reply| TableCommand::TransferLeader {
            user_id,
            new_leader,
            reply,
        })
        .await
    }

    pub async fn summary(&self) -> Result<TableSummary, TableError> {
        self.request(|reply| TableCommand::Summary { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Table, TableError> {
        self.request(|reply| TableCommand::Snapshot { reply }).await
    }
}

pub struct TableActor {
    table: Table,
    ctx: Arc<ServerContext>,
    rx: mpsc::Receiver<TableCommand>,
}

impl TableActor {
    pub fn spawn(table: Table, ctx: Arc<ServerContext>) -> TableHandle {
        let (tx, rx) = mpsc::channel(ctx.config.table_command_buffer.max(1));
        let id = table.id;
        let actor = Self { table, ctx, rx };
        tokio::spawn(actor.run());
        TableHandle { id, tx }
    }

    async fn run(mut self) {
        let prefix = self.table.log_prefix();
        log::info!("{prefix}Created by user {}", self.table.owner);
        self.ctx.bus.notify_all_table(&self.table).await;
        if let Some(session) = self.table.players.first().and_then(|p| p.session.clone()) {
            self.ctx.bus.notify_all_user(&session).await;
        }

        let idle = self.ctx.config.idle_timeout();
        while !self.table.is_deleted() {
            match tokio::time::timeout(idle, self.rx.recv()).await {
                Ok(Some(command)) => self.handle(command).await,
                Ok(None) => break,
                Err(_) => {
                    log::info!("{}Idle for {}s", self.table.log_prefix(), idle.as_secs());
                    if let Err(err) = self.idle_timeout().await {
                        log::warn!("{}Idle timeout failed: {err}", self.table.log_prefix());
                    }
                }
            }
        }

        self.ctx.tables.remove(self.table.id).await;
        self.release_sessions().await;
        log::info!("{}Closed", self.table.log_prefix());
    }

    async fn release_sessions(&self) {
        let sessions: Vec<_> = self
            .table
            .players
            .iter()
            .filter_map(|p| p.session.clone())
            .chain(self.table.spectators.iter().filter_map(|s| s.session.clone()))
            .filter(|s| s.table_id() == Some(self.table.id))
            .collect();
        for session in sessions {
            session.set_status(Status::Lobby, None);
            self.ctx.bus.notify_all_user(&session).await;
        }
    }

    async fn handle(&mut self, command: TableCommand) {
        match command {
            TableCommand::Join { session, reply } => {
                let result = self.table.join(session.clone());
                if result.is_ok() {
                    self.ctx.bus.notify_all_table(&self.table).await;
                    self.ctx.bus.notify_all_user(&session).await;
                }
                let _ = reply.send(result);
            }
            TableCommand::Leave { user_id, reply } => {
                let result = self.leave(user_id).await;
                let _ = reply.send(result);
            }
            TableCommand::Start {
                user_id,
                seed,
                reply,
            } => {
                let result = self.start(user_id, seed).await;
                let _ = reply.send(result);
            }
            TableCommand::Perform {
                user_id,
                action,
                reply,
            } => {
                let result = self.perform(user_id, action).await;
                let _ = reply.send(result);
            }
            TableCommand::Terminate { user_id, reply } => {
                let result = match self.table.terminate(user_id) {
                    Ok(()) => {
                        self.finish().await;
                        Ok(self.table.state)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            TableCommand::IdleTimeout { reply } => {
                let result = self.idle_timeout().await;
                let _ = reply.send(result);
            }
            TableCommand::SetPresence {
                user_id,
                session,
                present,
                reply,
            } => {
                let result = self.table.set_presence(user_id, present, session);
                if result.is_ok() {
                    self.ctx.bus.notify_connected(&self.table);
                }
                let _ = reply.send(result);
            }
            TableCommand::Note {
                user_id,
                order,
                text,
                reply,
            } => {
                let result = self.table.set_note(user_id, order, text);
                if result.is_ok() && self.table.state == TableState::Replay {
                    self.ctx.bus.notify_note_list(&self.table);
                }
                let _ = reply.send(result);
            }
            TableCommand::Chat {
                user_id,
                msg,
                reply,
            } => {
                let result = self.table.add_chat(user_id, msg, Utc::now()).map(|chat| {
                    self.ctx
                        .bus
                        .notify_table_chat(&self.table, &chat.name, &chat.msg)
                });
                let _ = reply.send(result);
            }
            TableCommand::Tag {
                user_id,
                tag,
                reply,
            } => {
                let _ = reply.send(self.table.add_tag(user_id, tag));
            }
            TableCommand::ReplayTurn {
                user_id,
                turn,
                reply,
            } => {
                let result = self.table.set_replay_turn(user_id, turn);
                if result.is_ok() {
                    self.ctx.bus.notify_replay_turn(&self.table);
                }
                let _ = reply.send(result);
            }
            TableCommand::TransferLeader {
                user_id,
                new_leader,
                reply,
            } => {
                let result = self.table.transfer_leader(user_id, new_leader);
                if result.is_ok() {
                    self.ctx.bus.notify_replay_leader(&self.table, true);
                }
                let _ = reply.send(result);
            }
            TableCommand::Summary { reply } => {
                let _ = reply.send(Ok(self.table.summary()));
            }
            TableCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.table.clone()));
            }
        }
    }

    async fn leave(&mut self, user_id: i64) -> Result<(), TableError> {
        let leader = self.table.owner;
        self.table.leave(user_id)?;
        if let Some(session) = self.ctx.sessions.get(user_id).await {
            self.ctx.bus.notify_all_user(&session).await;
        }
        if self.table.is_deleted() {
            self.ctx.bus.notify_all_table_gone(self.table.id).await;
            return Ok(());
        }
        self.ctx.bus.notify_all_table(&self.table).await;
        if self.table.state == TableState::Replay {
            self.ctx.bus.notify_spectators(&self.table);
            if leader != self.table.owner {
                self.ctx.bus.notify_replay_leader(&self.table, false);
            }
        }
        Ok(())
    }

    async fn start(&mut self, user_id: i64, seed: Option<u64>) -> Result<(), TableError> {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen_range(1..1_000_000));
        self.table
            .start(user_id, &self.ctx.catalog, seed, Utc::now())?;
        for session in self.table.sessions() {
            session.emit(ServerMessage::GameStart {
                table_id: self.table.id,
            });
        }
        self.ctx.bus.notify_turn(&self.table);
        self.ctx.bus.notify_all_table(&self.table).await;
        let sessions: Vec<_> = self.table.sessions().cloned().collect();
        for session in sessions {
            self.ctx.bus.notify_all_user(&session).await;
        }
        Ok(())
    }

    async fn perform(&mut self, user_id: i64, action: Action) -> Result<TableState, TableError> {
        let outcome = self
            .table
            .perform(user_id, action, self.ctx.rules.as_ref(), Utc::now())?;
        if outcome != TurnOutcome::TimedOut {
            self.ctx.bus.notify_game_action(&self.table);
        }
        if outcome == TurnOutcome::Continue {
            self.ctx.bus.notify_turn(&self.table);
        } else {
            self.finish().await;
        }
        Ok(self.table.state)
    }

    async fn idle_timeout(&mut self) -> Result<TableState, TableError> {
        if self.table.idle_timeout()? {
            self.finish().await;
        } else {
            self.ctx.bus.notify_all_table_gone(self.table.id).await;
        }
        Ok(self.table.state)
    }

    async fn finish(&mut self) {
        let prefix = self.table.log_prefix();
        match self.ctx.sequencer.end(&mut self.table, Utc::now()).await {
            Ok(outcome) => log::info!("{prefix}End sequence finished: {outcome:?}"),
            Err(err) => {
                log::error!("{prefix}End sequence aborted: {err}");
                if let Err(err) = self.table.transition(TableState::Deleted) {
                    log::warn!("{prefix}Could not delete the table: {err}");
                }
            }
        }
    }
}

//! Connected users and the registry that maps user ids to their connection.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::message::ServerMessage;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    Lobby,
    PreGame,
    Playing,
    Spectating,
    SharedReplay,
}

#[derive(Debug, Default)]
struct SessionState {
    status: Status,
    table_id: Option<u64>,
}

/// One live client connection. Sends never wait on the client.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    tx: mpsc::UnboundedSender<ServerMessage>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        user_id: i64,
        name: impl Into<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            tx,
            state: Mutex::new(SessionState::default()),
        });
        (session, rx)
    }

    pub fn emit(&self, message: ServerMessage) {
        let event = message.event_name();
        if self.tx.send(message).is_err() {
            log::debug!("Dropped {event} for {}: connection closed", self.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub fn table_id(&self) -> Option<u64> {
        self.state.lock().table_id
    }

    pub fn set_status(&self, status: Status, table_id: Option<u64>) {
        let mut state = self.state.lock();
        state.status = status;
        state.table_id = table_id;
    }

    pub fn user_message(&self) -> ServerMessage {
        let state = self.state.lock();
        ServerMessage::User {
            user_id: self.user_id,
            name: self.name.clone(),
            status: state.status,
            table_id: state.table_id,
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<i64, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<Session>) {
        log::info!("User {} ({}) connected", session.name, session.user_id);
        self.sessions.write().await.insert(session.user_id, session);
    }

    pub async fn unregister(&self, user_id: i64) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(&user_id);
        if removed.is_none() {
            log::warn!("Tried to unregister unknown user {user_id}");
        }
        removed
    }

    pub async fn get(&self, user_id: i64) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .is_some_and(|s| !s.is_closed())
    }

    pub async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }
}

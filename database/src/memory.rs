//! A gateway that keeps everything in process memory. Individual calls can be
//! made to fail, which is how the end-of-game error paths get exercised.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use types::Action;

use crate::{DatabaseError, GameRow, PersistenceGateway, UserStatsRow, VariantStatsRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertGame,
    InsertParticipant,
    InsertNote,
    InsertAction,
    InsertChatMessage,
    InsertTag,
    GetUserStats,
    UpdateUserStats,
    GetVariantStats,
    UpdateVariantStats,
    NumSimilar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredParticipant {
    pub game_id: i64,
    pub user_id: i64,
    pub seat: usize,
    pub character_id: i32,
    pub character_metadata: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNote {
    pub user_id: i64,
    pub game_id: i64,
    pub card_order: usize,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub games: Vec<(i64, GameRow)>,
    pub participants: Vec<StoredParticipant>,
    pub notes: Vec<StoredNote>,
    pub actions: Vec<(i64, usize, Action)>,
    pub chat: Vec<(i64, String, String)>,
    pub tags: Vec<(i64, String)>,
    pub user_stats: HashMap<(i64, i32), UserStatsRow>,
    pub variant_stats: HashMap<i32, VariantStatsRow>,
}

impl MemoryState {
    pub fn actions_for(&self, game_id: i64) -> Vec<(usize, Action)> {
        self.actions
            .iter()
            .filter(|(id, _, _)| *id == game_id)
            .map(|(_, turn, action)| (*turn, action.clone()))
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    failures: Mutex<HashSet<FailPoint>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, point: FailPoint) {
        self.failures.lock().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    async fn check(&self, point: FailPoint) -> Result<(), DatabaseError> {
        if self.failures.lock().await.contains(&point) {
            return Err(DatabaseError::Query(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn insert_game(&self, row: &GameRow) -> Result<i64, DatabaseError> {
        self.check(FailPoint::InsertGame).await?;
        let mut state = self.state.lock().await;
        let id = state.games.len() as i64 + 1;
        state.games.push((id, row.clone()));
        Ok(id)
    }

    async fn insert_participant(
        &self,
        game_id: i64,
        user_id: i64,
        seat: usize,
        character_id: i32,
        character_metadata: i32,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::InsertParticipant).await?;
        self.state.lock().await.participants.push(StoredParticipant {
            game_id,
            user_id,
            seat,
            character_id,
            character_metadata,
        });
        Ok(())
    }

    async fn insert_note(
        &self,
        user_id: i64,
        game_id: i64,
        card_order: usize,
        note: &str,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::InsertNote).await?;
        self.state.lock().await.notes.push(StoredNote {
            user_id,
            game_id,
            card_order,
            note: note.to_string(),
        });
        Ok(())
    }

    async fn insert_action(
        &self,
        game_id: i64,
        turn: usize,
        action: &Action,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::InsertAction).await?;
        self.state
            .lock()
            .await
            .actions
            .push((game_id, turn, action.clone()));
        Ok(())
    }

    async fn insert_chat_message(
        &self,
        user_id: i64,
        message: &str,
        room: &str,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::InsertChatMessage).await?;
        self.state
            .lock()
            .await
            .chat
            .push((user_id, message.to_string(), room.to_string()));
        Ok(())
    }

    async fn insert_tag(&self, game_id: i64, tag: &str) -> Result<(), DatabaseError> {
        self.check(FailPoint::InsertTag).await?;
        self.state.lock().await.tags.push((game_id, tag.to_string()));
        Ok(())
    }

    async fn get_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
    ) -> Result<UserStatsRow, DatabaseError> {
        self.check(FailPoint::GetUserStats).await?;
        Ok(self
            .state
            .lock()
            .await
            .user_stats
            .get(&(user_id, variant_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
        stats: &UserStatsRow,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::UpdateUserStats).await?;
        self.state
            .lock()
            .await
            .user_stats
            .insert((user_id, variant_id), stats.clone());
        Ok(())
    }

    async fn get_variant_stats(&self, variant_id: i32) -> Result<VariantStatsRow, DatabaseError> {
        self.check(FailPoint::GetVariantStats).await?;
        Ok(self
            .state
            .lock()
            .await
            .variant_stats
            .get(&variant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_variant_stats(
        &self,
        variant_id: i32,
        stats: &VariantStatsRow,
    ) -> Result<(), DatabaseError> {
        self.check(FailPoint::UpdateVariantStats).await?;
        self.state
            .lock()
            .await
            .variant_stats
            .insert(variant_id, stats.clone());
        Ok(())
    }

    async fn get_num_similar_by_seed(&self, seed: &str) -> Result<i64, DatabaseError> {
        self.check(FailPoint::NumSimilar).await?;
        Ok(self
            .state
            .lock()
            .await
            .games
            .iter()
            .filter(|(_, row)| row.seed == seed)
            .count() as i64)
    }
}

use async_trait::async_trait;
use types::Action;

use crate::{DatabaseError, GameRow, UserStatsRow, VariantStatsRow};

/// Durable storage for finished games. Every call stands on its own; there is
/// no transaction spanning calls.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn insert_game(&self, row: &GameRow) -> Result<i64, DatabaseError>;

    async fn insert_participant(
        &self,
        game_id: i64,
        user_id: i64,
        seat: usize,
        character_id: i32,
        character_metadata: i32,
    ) -> Result<(), DatabaseError>;

    async fn insert_note(
        &self,
        user_id: i64,
        game_id: i64,
        card_order: usize,
        note: &str,
    ) -> Result<(), DatabaseError>;

    async fn insert_action(
        &self,
        game_id: i64,
        turn: usize,
        action: &Action,
    ) -> Result<(), DatabaseError>;

    async fn insert_chat_message(
        &self,
        user_id: i64,
        message: &str,
        room: &str,
    ) -> Result<(), DatabaseError>;

    async fn insert_tag(&self, game_id: i64, tag: &str) -> Result<(), DatabaseError>;

    /// Users with no row yet get a zeroed row.
    async fn get_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
    ) -> Result<UserStatsRow, DatabaseError>;

    async fn update_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
        stats: &UserStatsRow,
    ) -> Result<(), DatabaseError>;

    async fn get_variant_stats(&self, variant_id: i32) -> Result<VariantStatsRow, DatabaseError>;

    async fn update_variant_stats(
        &self,
        variant_id: i32,
        stats: &VariantStatsRow,
    ) -> Result<(), DatabaseError>;

    /// Number of stored games played on `seed`, including any just inserted.
    async fn get_num_similar_by_seed(&self, seed: &str) -> Result<i64, DatabaseError>;
}

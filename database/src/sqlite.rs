use sqlx::{Row, SqlitePool};
use types::Action;

use crate::{
    DatabaseError, GameRow, PersistenceGateway, UserStatsRow, VariantStatsRow,
};

pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn insert_game(&self, row: &GameRow) -> Result<i64, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO games (name, num_players, variant_id, timed, time_base, time_per_turn, speedrun, card_cycle, deck_plays, empty_clues, character_assignments, seed, score, num_turns, end_condition, datetime_started, datetime_finished) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&row.name)
        .bind(row.num_players as i64)
        .bind(row.variant_id)
        .bind(row.timed)
        .bind(row.time_base)
        .bind(row.time_per_turn)
        .bind(row.speedrun)
        .bind(row.card_cycle)
        .bind(row.deck_plays)
        .bind(row.empty_clues)
        .bind(row.character_assignments)
        .bind(&row.seed)
        .bind(row.score as i64)
        .bind(row.num_turns as i64)
        .bind(row.end_condition.as_i32())
        .bind(row.datetime_started)
        .bind(row.datetime_finished)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_participant(
        &self,
        game_id: i64,
        user_id: i64,
        seat: usize,
        character_id: i32,
        character_metadata: i32,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO game_participants (game_id, user_id, seat, character_assignment, character_metadata) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(game_id)
        .bind(user_id)
        .bind(seat as i64)
        .bind(character_id)
        .bind(character_metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_note(
        &self,
        user_id: i64,
        game_id: i64,
        card_order: usize,
        note: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO game_participant_notes (user_id, game_id, card_order, note) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(game_id)
        .bind(card_order as i64)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_action(
        &self,
        game_id: i64,
        turn: usize,
        action: &Action,
    ) -> Result<(), DatabaseError> {
        let action_json = serde_json::to_vec(action).map_err(DatabaseError::Serialization)?;
        sqlx::query("INSERT INTO game_actions (game_id, turn, action) VALUES (?, ?, ?)")
            .bind(game_id)
            .bind(turn as i64)
            .bind(action_json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_chat_message(
        &self,
        user_id: i64,
        message: &str,
        room: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO chat_log (user_id, message, room) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(message)
            .bind(room)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_tag(&self, game_id: i64, tag: &str) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO game_tags (game_id, tag) VALUES (?, ?)")
            .bind(game_id)
            .bind(tag)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
    ) -> Result<UserStatsRow, DatabaseError> {
        let row = sqlx::query(
            "SELECT num_games, best_scores, average_score, num_strikeouts FROM user_stats WHERE user_id = ? AND variant_id = ?",
        )
        .bind(user_id)
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(UserStatsRow::default());
        };
        let best_scores: Vec<u8> = row.try_get("best_scores")?;
        Ok(UserStatsRow {
            num_games: row.try_get("num_games")?,
            best_scores: serde_json::from_slice(&best_scores)?,
            average_score: row.try_get("average_score")?,
            num_strikeouts: row.try_get("num_strikeouts")?,
        })
    }

    async fn update_user_stats(
        &self,
        user_id: i64,
        variant_id: i32,
        stats: &UserStatsRow,
    ) -> Result<(), DatabaseError> {
        let best_scores = serde_json::to_vec(&stats.best_scores)?;
        sqlx::query(
            "INSERT INTO user_stats (user_id, variant_id, num_games, best_scores, average_score, num_strikeouts) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, variant_id) DO UPDATE SET num_games = excluded.num_games, best_scores = excluded.best_scores, average_score = excluded.average_score, num_strikeouts = excluded.num_strikeouts",
        )
        .bind(user_id)
        .bind(variant_id)
        .bind(stats.num_games)
        .bind(best_scores)
        .bind(stats.average_score)
        .bind(stats.num_strikeouts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_variant_stats(&self, variant_id: i32) -> Result<VariantStatsRow, DatabaseError> {
        let row = sqlx::query(
            "SELECT num_games, best_scores, num_max_scores, average_score, num_strikeouts FROM variant_stats WHERE variant_id = ?",
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(VariantStatsRow::default());
        };
        let best_scores: Vec<u8> = row.try_get("best_scores")?;
        Ok(VariantStatsRow {
            num_games: row.try_get("num_games")?,
            best_scores: serde_json::from_slice(&best_scores)?,
            num_max_scores: row.try_get("num_max_scores")?,
            average_score: row.try_get("average_score")?,
            num_strikeouts: row.try_get("num_strikeouts")?,
        })
    }

    async fn update_variant_stats(
        &self,
        variant_id: i32,
        stats: &VariantStatsRow,
    ) -> Result<(), DatabaseError> {
        let best_scores = serde_json::to_vec(&stats.best_scores)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        sqlx::query(
            "INSERT INTO variant_stats (variant_id, num_games, best_scores, num_max_scores, average_score, num_strikeouts) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (variant_id) DO UPDATE SET num_games = excluded.num_games, best_scores = excluded.best_scores, num_max_scores = excluded.num_max_scores, average_score = excluded.average_score, num_strikeouts = excluded.num_strikeouts",
        )
        .bind(variant_id)
        .bind(stats.num_games)
        .bind(best_scores)
        .bind(stats.num_max_scores)
        .bind(stats.average_score)
        .bind(stats.num_strikeouts)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn get_num_similar_by_seed(&self, seed: &str) -> Result<i64, DatabaseError> {
        let row = sqlx::query("SELECT COUNT(*) AS num_similar FROM games WHERE seed = ?")
            .bind(seed)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("num_similar")?)
    }
}

pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod retry;
pub mod sqlite;

pub use config::DatabaseConfig;
pub use error::DatabaseError;
pub use gateway::PersistenceGateway;
pub use memory::{FailPoint, MemoryGateway, MemoryState};
pub use models::{
    player_bucket, BestScore, GameHistoryRecord, GameRow, UserStatsRow, VariantStatsRow,
    NUM_PLAYER_BUCKETS,
};
pub use retry::retry_with_backoff;
pub use sqlite::SqliteGateway;

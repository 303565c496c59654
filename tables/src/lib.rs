pub mod actor;
pub mod bus;
pub mod config;
pub mod context;
pub mod end;
pub mod error;
pub mod message;
pub mod registry;
pub mod replay;
pub mod session;
pub mod stats;
pub mod table;

pub use actor::{TableCommand, TableHandle};
pub use bus::NotificationBus;
pub use config::{ConfigError, ServerConfig};
pub use context::ServerContext;
pub use end::{EndOutcome, GameEndSequencer};
pub use error::{EndGameError, Severity, TableError};
pub use message::{NoteListEntry, ServerMessage, TableSummary};
pub use registry::TableRegistry;
pub use replay::ReplayConverter;
pub use session::{Session, SessionRegistry, Status};
pub use table::{Player, Spectator, Table, TableState, TurnOutcome};

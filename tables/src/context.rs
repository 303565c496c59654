use std::sync::Arc;

use database::PersistenceGateway;
use types::{Catalog, GameOptions, RulesEngine, StandardRules};

use crate::{
    actor::{TableActor, TableHandle},
    bus::NotificationBus,
    config::ServerConfig,
    end::GameEndSequencer,
    error::TableError,
    registry::TableRegistry,
    session::{Session, SessionRegistry},
    table::Table,
};

pub struct ServerContext {
    pub config: ServerConfig,
    pub catalog: Arc<Catalog>,
    pub rules: Arc<dyn RulesEngine>,
    pub sessions: SessionRegistry,
    pub bus: NotificationBus,
    pub tables: TableRegistry,
    pub sequencer: GameEndSequencer,
}

impl ServerContext {
    pub fn new(
        config: ServerConfig,
        catalog: Catalog,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Arc<Self> {
        Self::with_rules(config, catalog, gateway, Arc::new(StandardRules))
    }

    pub fn with_rules(
        config: ServerConfig,
        catalog: Catalog,
        gateway: Arc<dyn PersistenceGateway>,
        rules: Arc<dyn RulesEngine>,
    ) -> Arc<Self> {
        let catalog = Arc::new(catalog);
        let sessions = SessionRegistry::new();
        let bus = NotificationBus::new(sessions.clone());
        let sequencer = GameEndSequencer::new(gateway, bus.clone(), Arc::clone(&catalog));
        Arc::new(Self {
            config,
            catalog,
            rules,
            sessions,
            bus,
            tables: TableRegistry::new(),
            sequencer,
        })
    }

    pub async fn create_table(
        self: &Arc<Self>,
        owner: Arc<Session>,
        name: String,
        options: GameOptions,
    ) -> Result<TableHandle, TableError> {
        if self.catalog.variant(&options.variant).is_none() {
            return Err(TableError::UnknownVariant(options.variant));
        }
        if owner.table_id().is_some() {
            return Err(TableError::AlreadyJoined(owner.user_id));
        }
        let ctx = Arc::clone(self);
        let handle = self
            .tables
            .insert_with(|id| TableActor::spawn(Table::new(id, name, owner, options), ctx))
            .await;
        Ok(handle)
    }

    pub async fn table(&self, id: u64) -> Result<TableHandle, TableError> {
        self.tables.get(id).await.ok_or(TableError::NotFound(id))
    }
}

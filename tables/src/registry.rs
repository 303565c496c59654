//! The process-wide map of live tables.

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;

use crate::{actor::TableHandle, message::TableSummary};

#[derive(Default)]
struct RegistryState {
    last_id: u64,
    tables: BTreeMap<u64, TableHandle>,
}

/// Thread-safe registry of running tables. Ids are handed out and claimed
/// under the same write lock, so two tables never share one.
#[derive(Clone, Default)]
pub struct TableRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_with(&self, spawn: impl FnOnce(u64) -> TableHandle) -> TableHandle {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let id = state.last_id;
        let handle = spawn(id);
        state.tables.insert(id, handle.clone());
        log::debug!("Registered table {id}");
        handle
    }

    pub async fn remove(&self, id: u64) -> Option<TableHandle> {
        let removed = self.state.write().await.tables.remove(&id);
        if removed.is_none() {
            log::warn!("Tried to remove unknown table {id}");
        }
        removed
    }

    pub async fn get(&self, id: u64) -> Option<TableHandle> {
        self.state.read().await.tables.get(&id).cloned()
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.state.read().await.tables.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tables.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn list(&self) -> Vec<TableSummary> {
        let handles: Vec<_> = self.state.read().await.tables.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(summary) = handle.summary().await {
                summaries.push(summary);
            }
        }
        summaries
    }
}

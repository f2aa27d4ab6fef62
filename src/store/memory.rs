use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RefreshTokenStore, Rotation, StoreResult};
use crate::auth::{RefreshTokenRecord, SessionId};
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    records: HashMap<String, RefreshTokenRecord>,
    /// Token values per session in insertion order
    chains: HashMap<SessionId, Vec<String>>,
}

impl Tables {
    fn insert(&mut self, record: &RefreshTokenRecord) -> StoreResult<()> {
        if self.records.contains_key(&record.token) {
            return Err(StoreError::Conflict);
        }
        self.records.insert(record.token.clone(), record.clone());
        self.chains
            .entry(record.session_id.clone())
            .or_default()
            .push(record.token.clone());
        Ok(())
    }
}

/// Process-local store for tests and single-instance deployments.
///
/// One lock covers both tables, so chain-wide operations and rotation are
/// atomic. The lock is never held across an await point.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tables: RwLock<Tables>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn find_by_value(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.tables.read().records.get(token).cloned())
    }

    async fn find_by_session(&self, session_id: &SessionId) -> StoreResult<Vec<RefreshTokenRecord>> {
        let tables = self.tables.read();
        let chain = tables
            .chains
            .get(session_id)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter_map(|token| tables.records.get(token).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(chain)
    }

    async fn create(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        self.tables.write().insert(record)
    }

    async fn invalidate(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        if let Some(stored) = self.tables.write().records.get_mut(&record.token) {
            stored.is_valid = false;
        }
        Ok(())
    }

    async fn invalidate_chain(&self, session_id: &SessionId) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let Tables { records, chains } = &mut *tables;

        let mut changed = 0;
        for token in chains.get(session_id).into_iter().flatten() {
            if let Some(record) = records.get_mut(token) {
                if record.is_valid {
                    record.is_valid = false;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn rotate(&self, presented: &str, successor: &RefreshTokenRecord) -> StoreResult<Rotation> {
        let mut tables = self.tables.write();

        match tables.records.get(presented) {
            Some(record) if record.is_valid => {}
            _ => return Ok(Rotation::Stale),
        }
        tables.insert(successor)?;
        if let Some(record) = tables.records.get_mut(presented) {
            record.is_valid = false;
        }
        Ok(Rotation::Rotated)
    }
}

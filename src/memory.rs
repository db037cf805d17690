use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{apply_conditional, StoreClient, StoreError};
use crate::expression::{Condition, Record, TransactItem, Update};
use crate::token::ClientRequestToken;

#[derive(Default)]
struct State {
    tables: HashSet<String>,
    records: HashMap<(String, String), Record>,
    committed_tokens: HashSet<ClientRequestToken>,
}

impl State {
    fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        if self.tables.contains(table) {
            Ok(())
        } else {
            Err(StoreError::TableNotFound(table.to_string()))
        }
    }

    fn get(&self, table: &str, id: &str) -> Option<Record> {
        self.records
            .get(&(table.to_string(), id.to_string()))
            .cloned()
    }
}

#[derive(Default)]
struct Faults {
    fail_next: AtomicU32,
    drop_acks: AtomicU32,
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Process-local store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// The next `n` calls fail with a transient error without touching the data.
    pub fn fail_next(&self, n: u32) {
        self.faults.fail_next.store(n, Ordering::SeqCst);
    }

    #[cfg(test)]
    /// The next `n` transactions commit but report a transient error, the way a
    /// lost acknowledgement looks to the caller.
    pub fn drop_next_acks(&self, n: u32) {
        self.faults.drop_acks.store(n, Ordering::SeqCst);
    }

    fn inject(&self) -> Result<(), StoreError> {
        if take_one(&self.faults.fail_next) {
            return Err(StoreError::Transient("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreClient for MemoryClient {
    async fn read(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        self.inject()?;
        let state = self.state.lock().await;
        state.ensure_table(table)?;
        state
            .get(table, id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn conditional_update(
        &self,
        table: &str,
        id: &str,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<Record, StoreError> {
        self.inject()?;
        let mut state = self.state.lock().await;
        state.ensure_table(table)?;
        let record = apply_conditional(state.get(table, id), id, update, condition)?;
        state
            .records
            .insert((table.to_string(), id.to_string()), record.clone());
        Ok(record)
    }

    async fn transactional_update(
        &self,
        items: &[TransactItem],
        token: &ClientRequestToken,
    ) -> Result<(), StoreError> {
        self.inject()?;
        let mut state = self.state.lock().await;
        if state.committed_tokens.contains(token) {
            return Ok(());
        }

        // evaluate everything before writing anything
        let mut staged = Vec::with_capacity(items.len());
        for item in items {
            state.ensure_table(&item.table)?;
            let current = state.get(&item.table, &item.id);
            let record = apply_conditional(current, &item.id, &item.update, item.condition.as_ref())?;
            staged.push(((item.table.clone(), item.id.clone()), record));
        }
        state.records.extend(staged);
        state.committed_tokens.insert(token.clone());

        if take_one(&self.faults.drop_acks) {
            return Err(StoreError::Transient("acknowledgement lost".to_string()));
        }
        Ok(())
    }

    async fn create_table(&self, table: &str) -> Result<(), StoreError> {
        self.inject()?;
        let mut state = self.state.lock().await;
        if !state.tables.insert(table.to_string()) {
            return Err(StoreError::TableExists(table.to_string()));
        }
        Ok(())
    }

    async fn put(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        self.inject()?;
        let mut state = self.state.lock().await;
        state.ensure_table(table)?;
        state
            .records
            .insert((table.to_string(), record.id.clone()), record.clone());
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        self.inject()?;
        let mut state = self.state.lock().await;
        state.ensure_table(table)?;
        state.records.remove(&(table.to_string(), id.to_string()));
        Ok(())
    }
}

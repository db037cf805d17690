#![cfg(feature = "surrealkv")]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use surrealkv::{Mode, Transaction};

use crate::client::{
    apply_conditional, record_key, table_key, token_key, transient, StoreClient, StoreError,
};
use crate::expression::{Condition, Record, TransactItem, Update};
use crate::token::ClientRequestToken;

/// Embedded surrealkv store. Every operation is one read-write transaction, so
/// two workers racing on the record surface as a commit conflict.
#[derive(Clone)]
pub struct SurrealKVClient {
    pub(crate) db: Arc<surrealkv::Store>,
}

impl SurrealKVClient {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut opts = surrealkv::Options::new();
        opts.enable_versions = false;
        opts.disk_persistence = true;
        opts.dir = dir.to_path_buf();

        let store = Arc::new(surrealkv::Store::new(opts)?);
        Ok(Self { db: store })
    }

    fn begin(&self, mode: Mode) -> Result<Transaction, StoreError> {
        self.db.begin_with_mode(mode).map_err(transient)
    }
}

fn ensure_table(txn: &mut Transaction, table: &str) -> Result<(), StoreError> {
    match txn.get(table_key(table).as_bytes()).map_err(transient)? {
        Some(_) => Ok(()),
        None => Err(StoreError::TableNotFound(table.to_string())),
    }
}

fn load(txn: &mut Transaction, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
    match txn.get(record_key(table, id).as_bytes()).map_err(transient)? {
        Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
        None => Ok(None),
    }
}

fn store(txn: &mut Transaction, table: &str, record: &Record) -> Result<(), StoreError> {
    let serialized = serde_json::to_vec(record)?;
    txn.set(record_key(table, &record.id).as_bytes(), &serialized)
        .map_err(transient)
}

#[async_trait]
impl StoreClient for SurrealKVClient {
    async fn read(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let mut txn = self.begin(Mode::ReadOnly)?;
        ensure_table(&mut txn, table)?;
        load(&mut txn, table, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn conditional_update(
        &self,
        table: &str,
        id: &str,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<Record, StoreError> {
        let mut txn = self.begin(Mode::ReadWrite)?;
        ensure_table(&mut txn, table)?;
        let record = apply_conditional(load(&mut txn, table, id)?, id, update, condition)?;
        store(&mut txn, table, &record)?;
        txn.commit().await.map_err(transient)?;
        Ok(record)
    }

    async fn transactional_update(
        &self,
        items: &[TransactItem],
        token: &ClientRequestToken,
    ) -> Result<(), StoreError> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        let marker = token_key(&first.table, token);

        let mut txn = self.begin(Mode::ReadWrite)?;
        if txn.get(marker.as_bytes()).map_err(transient)?.is_some() {
            return Ok(());
        }
        for item in items {
            ensure_table(&mut txn, &item.table)?;
            let current = load(&mut txn, &item.table, &item.id)?;
            let record =
                apply_conditional(current, &item.id, &item.update, item.condition.as_ref())?;
            store(&mut txn, &item.table, &record)?;
        }
        txn.set(marker.as_bytes(), b"1").map_err(transient)?;
        txn.commit().await.map_err(transient)
    }

    async fn create_table(&self, table: &str) -> Result<(), StoreError> {
        let mut txn = self.begin(Mode::ReadWrite)?;
        let key = table_key(table);
        if txn.get(key.as_bytes()).map_err(transient)?.is_some() {
            return Err(StoreError::TableExists(table.to_string()));
        }
        txn.set(key.as_bytes(), b"1").map_err(transient)?;
        txn.commit().await.map_err(transient)
    }

    async fn put(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        let mut txn = self.begin(Mode::ReadWrite)?;
        ensure_table(&mut txn, table)?;
        store(&mut txn, table, record)?;
        txn.commit().await.map_err(transient)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let mut txn = self.begin(Mode::ReadWrite)?;
        ensure_table(&mut txn, table)?;
        txn.delete(record_key(table, id).as_bytes())
            .map_err(transient)?;
        txn.commit().await.map_err(transient)
    }
}

#![cfg(feature = "rocksdb")]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{
    DBCompactionStyle, LogLevel, Options as RocksDBOptions, ReadOptions, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};

use crate::client::{
    apply_conditional, record_key, table_key, token_key, transient, StoreClient, StoreError,
};
use crate::expression::{Condition, Record, TransactItem, Update};
use crate::token::ClientRequestToken;

type Txn<'a> = Transaction<'a, TransactionDB>;

/// Embedded RocksDB store. Conditional updates lock the record with
/// `get_for_update`, so concurrent writers queue on the row lock.
#[derive(Clone)]
pub struct RocksDBClient {
    pub(crate) db: Arc<TransactionDB>,
}

impl RocksDBClient {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut opts = RocksDBOptions::default();
        // Ensure we use fdatasync
        opts.set_use_fsync(false);
        // Only use warning log level
        opts.set_log_level(LogLevel::Error);
        // Set the number of log files to keep
        opts.set_keep_log_file_num(20);
        // Create database if missing
        opts.create_if_missing(true);
        // Set the datastore compaction style
        opts.set_compaction_style(DBCompactionStyle::Level);
        // Increase the background thread count
        opts.increase_parallelism(4);

        let txn_db_opts = TransactionDBOptions::default();
        let db = TransactionDB::open(&opts, &txn_db_opts, dir)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn transaction(&self) -> Txn<'_> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_snapshot(true);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);

        self.db.transaction_opt(&write_opts, &txn_opts)
    }
}

fn ensure_table(txn: &Txn<'_>, table: &str) -> Result<(), StoreError> {
    match txn.get(table_key(table).as_bytes()).map_err(transient)? {
        Some(_) => Ok(()),
        None => Err(StoreError::TableNotFound(table.to_string())),
    }
}

fn load_for_update(txn: &Txn<'_>, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
    match txn
        .get_for_update(record_key(table, id).as_bytes(), true)
        .map_err(transient)?
    {
        Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
        None => Ok(None),
    }
}

fn store(txn: &Txn<'_>, table: &str, record: &Record) -> Result<(), StoreError> {
    let serialized = serde_json::to_vec(record)?;
    txn.put(record_key(table, &record.id).as_bytes(), &serialized)
        .map_err(transient)
}

#[async_trait]
impl StoreClient for RocksDBClient {
    async fn read(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let mut read_opts = ReadOptions::default();
        read_opts.fill_cache(true);

        if self
            .db
            .get_opt(table_key(table).as_bytes(), &read_opts)
            .map_err(transient)?
            .is_none()
        {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        match self
            .db
            .get_opt(record_key(table, id).as_bytes(), &read_opts)
            .map_err(transient)?
        {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn conditional_update(
        &self,
        table: &str,
        id: &str,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<Record, StoreError> {
        let txn = self.transaction();
        ensure_table(&txn, table)?;
        let record = apply_conditional(load_for_update(&txn, table, id)?, id, update, condition)?;
        store(&txn, table, &record)?;
        txn.commit().map_err(transient)?;
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

        let txn = self.transaction();
        if txn
            .get_for_update(marker.as_bytes(), true)
            .map_err(transient)?
            .is_some()
        {
            return Ok(());
        }
        for item in items {
            ensure_table(&txn, &item.table)?;
            let current = load_for_update(&txn, &item.table, &item.id)?;
            let record =
                apply_conditional(current, &item.id, &item.update, item.condition.as_ref())?;
            store(&txn, &item.table, &record)?;
        }
        txn.put(marker.as_bytes(), b"1").map_err(transient)?;
        txn.commit().map_err(transient)
    }

    async fn create_table(&self, table: &str) -> Result<(), StoreError> {
        let txn = self.transaction();
        let key = table_key(table);
        if txn
            .get_for_update(key.as_bytes(), true)
            .map_err(transient)?
            .is_some()
        {
            return Err(StoreError::TableExists(table.to_string()));
        }
        txn.put(key.as_bytes(), b"1").map_err(transient)?;
        txn.commit().map_err(transient)
    }

    async fn put(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        let txn = self.transaction();
        ensure_table(&txn, table)?;
        store(&txn, table, record)?;
        txn.commit().map_err(transient)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let txn = self.transaction();
        ensure_table(&txn, table)?;
        txn.delete(record_key(table, id).as_bytes())
            .map_err(transient)?;
        txn.commit().map_err(transient)
    }
}

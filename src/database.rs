use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use tracing::warn;

use crate::client::{StoreClient, StoreError};
use crate::expression::{Condition, Record, TransactItem, Update};
use crate::memory::MemoryClient;
#[cfg(feature = "rocksdb")]
use crate::rocksdb::RocksDBClient;
#[cfg(feature = "surrealkv")]
use crate::surrealkv::SurrealKVClient;
use crate::token::ClientRequestToken;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Database {
    Memory,
    #[cfg(feature = "surrealkv")]
    Surrealkv,
    #[cfg(feature = "rocksdb")]
    Rocksdb,
}

impl Database {
    /// Data directory used by an embedded backend when none is given.
    pub fn default_path(&self) -> Option<PathBuf> {
        match self {
            Database::Memory => None,
            #[cfg(feature = "surrealkv")]
            Database::Surrealkv => Some(PathBuf::from("contendkv_surrealkv")),
            #[cfg(feature = "rocksdb")]
            Database::Rocksdb => Some(PathBuf::from("contendkv_rocksdb")),
        }
    }

    /// Opens the backend once; workers clone the returned handle.
    pub fn connect(&self, endpoint: Option<&PathBuf>) -> Result<Store> {
        let path = endpoint.cloned().or_else(|| self.default_path());
        match (self, path) {
            (Database::Memory, _) => {
                if let Some(endpoint) = endpoint {
                    warn!(
                        "the memory store keeps no data directory; ignoring --endpoint-url {}",
                        endpoint.display()
                    );
                }
                Ok(Store::Memory(MemoryClient::new()))
            }
            #[cfg(feature = "surrealkv")]
            (Database::Surrealkv, Some(path)) => SurrealKVClient::open(&path)
                .map(Store::Surrealkv)
                .with_context(|| format!("opening surrealkv at {}", path.display())),
            #[cfg(feature = "rocksdb")]
            (Database::Rocksdb, Some(path)) => RocksDBClient::open(&path)
                .map(Store::Rocksdb)
                .with_context(|| format!("opening rocksdb at {}", path.display())),
            #[allow(unreachable_patterns)]
            (database, None) => anyhow::bail!("{:?} needs a data directory", database),
        }
    }
}

/// Whichever backend was selected on the command line.
#[derive(Clone)]
pub enum Store {
    Memory(MemoryClient),
    #[cfg(feature = "surrealkv")]
    Surrealkv(SurrealKVClient),
    #[cfg(feature = "rocksdb")]
    Rocksdb(RocksDBClient),
}

macro_rules! dispatch {
    ($store:expr, $client:ident => $call:expr) => {
        match $store {
            Store::Memory($client) => $call,
            #[cfg(feature = "surrealkv")]
            Store::Surrealkv($client) => $call,
            #[cfg(feature = "rocksdb")]
            Store::Rocksdb($client) => $call,
        }
    };
}

#[async_trait]
impl StoreClient for Store {
    async fn read(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        dispatch!(self, c => c.read(table, id).await)
    }

    async fn conditional_update(
        &self,
        table: &str,
        id: &str,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<Record, StoreError> {
        dispatch!(self, c => c.conditional_update(table, id, update, condition).await)
    }

    async fn transactional_update(
        &self,
        items: &[TransactItem],
        token: &ClientRequestToken,
    ) -> Result<(), StoreError> {
        dispatch!(self, c => c.transactional_update(items, token).await)
    }

    async fn create_table(&self, table: &str) -> Result<(), StoreError> {
        dispatch!(self, c => c.create_table(table).await)
    }

    async fn put(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        dispatch!(self, c => c.put(table, record).await)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        dispatch!(self, c => c.delete(table, id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_ignores_an_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("unused");
        let store = Database::Memory.connect(Some(&endpoint)).unwrap();
        assert!(matches!(store, Store::Memory(_)));
        assert!(!endpoint.exists());
    }

    #[cfg(feature = "surrealkv")]
    #[tokio::test]
    async fn embedded_backend_opens_at_the_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("data");
        let store = Database::Surrealkv.connect(Some(&endpoint)).unwrap();
        assert!(matches!(store, Store::Surrealkv(_)));
        store.create_table("bench").await.unwrap();
    }
}

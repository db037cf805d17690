use async_trait::async_trait;
use thiserror::Error;

use crate::expression::{Condition, Record, TransactItem, Update};
use crate::token::ClientRequestToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("The conditional request failed: {0}")]
    ConditionFailed(String),

    #[error("Could not find '{0}'")]
    NotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Store error: {0}")]
    Transient(String),

    #[error("Got error unmarshalling: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StoreError::ConditionFailed(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

/// Backend failures the caller may retry.
pub(crate) fn transient<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Transient(e.to_string())
}

/// Key layout shared by the embedded backends.
pub(crate) fn record_key(table: &str, id: &str) -> String {
    format!("t/{}/{}", table, id)
}

pub(crate) fn table_key(table: &str) -> String {
    format!("m/{}", table)
}

pub(crate) fn token_key(table: &str, token: &ClientRequestToken) -> String {
    format!("x/{}/{}", table, token)
}

/// Applies `update` to `current` if `condition` holds, returning the new image.
pub(crate) fn apply_conditional(
    current: Option<Record>,
    id: &str,
    update: &Update,
    condition: Option<&Condition>,
) -> Result<Record, StoreError> {
    let record = current.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    if let Some(condition) = condition {
        if !condition.evaluate(&record) {
            return Err(StoreError::ConditionFailed(condition.to_string()));
        }
    }
    update.apply(&record).ok_or_else(|| {
        StoreError::ConditionFailed(format!(
            "{} overflows age {} version {}",
            update, record.age, record.version
        ))
    })
}

#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Point lookup of a single record.
    async fn read(&self, table: &str, id: &str) -> Result<Record, StoreError>;

    /// Atomically apply `update` if `condition` holds against the stored record.
    /// Returns the record as it looks after the update.
    async fn conditional_update(
        &self,
        table: &str,
        id: &str,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<Record, StoreError>;

    /// Apply every item or none of them. Resubmitting a token that already
    /// committed is a successful no-op.
    async fn transactional_update(
        &self,
        items: &[TransactItem],
        token: &ClientRequestToken,
    ) -> Result<(), StoreError>;

    async fn create_table(&self, table: &str) -> Result<(), StoreError>;

    /// Write a record unconditionally.
    async fn put(&self, table: &str, record: &Record) -> Result<(), StoreError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;
}

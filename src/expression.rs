use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The single record under contention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub age: i64,
    #[serde(default)]
    pub version: i64,
}

impl Record {
    pub fn new(id: impl Into<String>, age: i64) -> Self {
        Self {
            id: id.into(),
            age,
            version: 0,
        }
    }
}

/// `set age = age + :age_delta, version = version + :version_delta`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub age_delta: i64,
    pub version_delta: i64,
}

impl Update {
    /// Unconditional counter bump, version untouched.
    pub const fn increment_age() -> Self {
        Self {
            age_delta: 1,
            version_delta: 0,
        }
    }

    /// Take one unit of `age` and bump the version.
    pub const fn decrement_with_version() -> Self {
        Self {
            age_delta: -1,
            version_delta: 1,
        }
    }

    /// New image of `record` after the update, or `None` if either attribute
    /// would leave the `i64` range.
    pub fn apply(&self, record: &Record) -> Option<Record> {
        Some(Record {
            id: record.id.clone(),
            age: record.age.checked_add(self.age_delta)?,
            version: record.version.checked_add(self.version_delta)?,
        })
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "set age = age {:+}", self.age_delta)?;
        if self.version_delta != 0 {
            write!(f, ", version = version {:+}", self.version_delta)?;
        }
        Ok(())
    }
}

/// Predicate evaluated against the stored record before an update is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AgeAtLeast(i64),
    AgeAbove(i64),
    AgeAtMost(i64),
    VersionEquals(i64),
    All(Vec<Condition>),
}

impl Condition {
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Condition::AgeAtLeast(min) => record.age >= *min,
            Condition::AgeAbove(min) => record.age > *min,
            Condition::AgeAtMost(max) => record.age <= *max,
            Condition::VersionEquals(version) => record.version == *version,
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(record)),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::AgeAtLeast(min) => write!(f, "age >= {}", min),
            Condition::AgeAbove(min) => write!(f, "age > {}", min),
            Condition::AgeAtMost(max) => write!(f, "age <= {}", max),
            Condition::VersionEquals(version) => write!(f, "version = {}", version),
            Condition::All(conditions) => {
                for (i, condition) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{}", condition)?;
                }
                Ok(())
            }
        }
    }
}

/// One conditional update submitted as part of an all-or-nothing transaction.
#[derive(Debug, Clone)]
pub struct TransactItem {
    pub table: String,
    pub id: String,
    pub update: Update,
    pub condition: Option<Condition>,
}

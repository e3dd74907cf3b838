//! Local row tables standing in for the hosted backend.
//!
//! Rows are JSON objects stored at `{table}/{id}` in a [`KVStore`]. The
//! backend enforces what the hosted schema would: unique likes per
//! (user, post), likes and comments referencing an existing post, and the
//! post counters that the hosted side maintains with its increment and
//! decrement procedures. Every write commits as one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrets_kv::{KVError, KVStore, WriteBatch};
use serde_json::Value;
use tracing::debug;

use crate::model::now_timestamp;
use crate::remote::{
    table, Mutation, MutationKind, MutationSink, Query, QuerySource, Record, RemoteError,
};

impl From<KVError> for RemoteError {
    fn from(e: KVError) -> Self {
        RemoteError::Storage(e.to_string())
    }
}

/// A child table that keeps a count on its parent post.
struct Counter {
    parent: &'static str,
    foreign_key: &'static str,
    column: &'static str,
}

struct TableRules {
    unique: &'static [&'static str],
    counter: Option<Counter>,
}

fn rules(name: &str) -> TableRules {
    match name {
        table::LIKES => TableRules {
            unique: &["user_id", "post_id"],
            counter: Some(Counter {
                parent: table::POSTS,
                foreign_key: "post_id",
                column: "likes_count",
            }),
        },
        table::COMMENTS => TableRules {
            unique: &[],
            counter: Some(Counter {
                parent: table::POSTS,
                foreign_key: "post_id",
                column: "comments_count",
            }),
        },
        _ => TableRules {
            unique: &[],
            counter: None,
        },
    }
}

fn rejected(code: &str, message: impl Into<String>) -> RemoteError {
    RemoteError::Rejected {
        code: code.to_string(),
        message: message.into(),
    }
}

fn row_key(table: &str, id: &str) -> String {
    format!("{table}/{id}")
}

fn encode(record: &Record) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec(record).map_err(|e| RemoteError::Storage(e.to_string()))
}

fn adjust(record: &mut Record, column: &str, delta: i64) {
    let current = record.get(column).and_then(Value::as_u64).unwrap_or(0) as i64;
    let next = (current + delta).max(0) as u64;
    record.insert(column.to_string(), Value::from(next));
}

/// Row tables over a [`KVStore`], implementing both remote contracts.
pub struct TableBackend {
    kv: Arc<dyn KVStore>,
    /// Serializes read-check-write sequences (uniqueness, counters).
    writes: tokio::sync::Mutex<()>,
}

impl TableBackend {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Read one row by id.
    pub fn get(&self, table: &str, id: &str) -> Result<Option<Record>, RemoteError> {
        match self.kv.get(&row_key(table, id))? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// All rows of a table as `(key, row)`, ordered by key.
    fn rows(&self, table: &str) -> Result<Vec<(String, Record)>, RemoteError> {
        self.kv
            .scan(&format!("{table}/"))?
            .into_iter()
            .map(|(key, bytes)| {
                serde_json::from_slice::<Record>(&bytes)
                    .map(|row| (key, row))
                    .map_err(|e| RemoteError::Decode(e.to_string()))
            })
            .collect()
    }

    fn check_table(name: &str) -> Result<(), RemoteError> {
        if name.is_empty() || name.contains('/') {
            return Err(rejected("BAD_TABLE", format!("invalid table name '{name}'")));
        }
        Ok(())
    }

    fn insert(&self, name: &str, mut row: Record) -> Result<Record, RemoteError> {
        Self::check_table(name)?;
        let rules = rules(name);

        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().simple().to_string(),
        };
        row.insert("id".into(), Value::from(id.clone()));
        if !row.contains_key("created_at") {
            row.insert("created_at".into(), Value::from(now_timestamp()));
        }
        if name == table::POSTS {
            row.entry("likes_count").or_insert(Value::from(0u64));
            row.entry("comments_count").or_insert(Value::from(0u64));
        }

        let key = row_key(name, &id);
        if self.kv.get(&key)?.is_some() {
            return Err(RemoteError::Conflict(format!("{name} '{id}' already exists")));
        }

        if !rules.unique.is_empty() {
            let duplicate = self.rows(name)?.into_iter().any(|(_, existing)| {
                rules.unique.iter().all(|col| existing.get(*col) == row.get(*col))
            });
            if duplicate {
                return Err(RemoteError::Conflict(format!(
                    "{name} already has a row for ({})",
                    rules.unique.join(", ")
                )));
            }
        }

        let mut batch = WriteBatch::new();
        if let Some(counter) = &rules.counter {
            let parent_id = row
                .get(counter.foreign_key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let Some(mut parent) = self.get(counter.parent, &parent_id)? else {
                return Err(rejected(
                    "FOREIGN_KEY",
                    format!("{} '{}' does not exist", counter.parent, parent_id),
                ));
            };
            adjust(&mut parent, counter.column, 1);
            batch.put(row_key(counter.parent, &parent_id), encode(&parent)?);
        }
        batch.put(key, encode(&row)?);
        self.kv.apply(batch)?;

        debug!(table = name, id = %id, "row inserted");
        Ok(row)
    }

    fn delete(&self, name: &str, matching: &Record) -> Result<usize, RemoteError> {
        Self::check_table(name)?;
        if matching.is_empty() {
            return Err(rejected("UNFILTERED_DELETE", "delete requires a match predicate"));
        }
        let rules = rules(name);

        let doomed: Vec<(String, Record)> = self
            .rows(name)?
            .into_iter()
            .filter(|(_, row)| matching.iter().all(|(col, v)| row.get(col) == Some(v)))
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        let mut parents: BTreeMap<String, Record> = BTreeMap::new();
        for (key, row) in &doomed {
            batch.delete(key.clone());
            let Some(counter) = &rules.counter else {
                continue;
            };
            let Some(parent_id) = row.get(counter.foreign_key).and_then(Value::as_str) else {
                continue;
            };
            let parent_key = row_key(counter.parent, parent_id);
            if !parents.contains_key(&parent_key) {
                match self.get(counter.parent, parent_id)? {
                    Some(parent) => {
                        parents.insert(parent_key.clone(), parent);
                    }
                    None => continue,
                }
            }
            if let Some(parent) = parents.get_mut(&parent_key) {
                adjust(parent, counter.column, -1);
            }
        }
        for (key, parent) in &parents {
            batch.put(key.clone(), encode(parent)?);
        }
        self.kv.apply(batch)?;

        debug!(table = name, removed = doomed.len(), "rows deleted");
        Ok(doomed.len())
    }
}

#[async_trait]
impl MutationSink for TableBackend {
    async fn mutate(&self, mutation: Mutation) -> Result<Option<Record>, RemoteError> {
        let _guard = self.writes.lock().await;
        match mutation.kind {
            MutationKind::Insert => self.insert(&mutation.table, mutation.payload).map(Some),
            MutationKind::Delete => self.delete(&mutation.table, &mutation.payload).map(|_| None),
        }
    }
}

#[async_trait]
impl QuerySource for TableBackend {
    async fn query(&self, query: Query) -> Result<Vec<Record>, RemoteError> {
        Self::check_table(&query.table)?;
        let rows = self.rows(&query.table)?.into_iter().map(|(_, row)| row);
        Ok(query.evaluate(rows))
    }
}

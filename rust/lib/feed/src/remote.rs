//! Contracts for the hosted backend.
//!
//! The client never talks to a concrete backend directly. It consults an
//! [`IdentityProvider`] before mutating, writes through a [`MutationSink`]
//! and reads through a [`QuerySource`]. Records are plain JSON objects keyed
//! by column name.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::model::Viewer;

/// One row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Remote table names.
pub mod table {
    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const LIKES: &str = "likes";
    pub const COMMENTS: &str = "comments";
}

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend refused the request (constraint, policy, bad input).
    #[error("rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// A unique constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request never got a definitive answer.
    #[error("transport: {0}")]
    Transport(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("decode: {0}")]
    Decode(String),
}

/// Decode a record into a typed row.
pub fn decode<T: DeserializeOwned>(record: Record) -> Result<T, RemoteError> {
    serde_json::from_value(Value::Object(record)).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Build a record from a `json!({...})` object literal.
///
/// Non-object values yield an empty record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

// ── Mutations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Delete,
}

/// A write against one table.
///
/// For `Insert` the payload is the new row. For `Delete` it is a match
/// predicate: every row equal on all payload columns is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub table: String,
    pub payload: Record,
}

impl Mutation {
    pub fn insert(table: &str, payload: Record) -> Self {
        Self {
            kind: MutationKind::Insert,
            table: table.to_string(),
            payload,
        }
    }

    pub fn delete(table: &str, matching: Record) -> Self {
        Self {
            kind: MutationKind::Delete,
            table: table.to_string(),
            payload: matching,
        }
    }
}

// ── Queries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::Eq(value.into()),
        }
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            column: column.to_string(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let Some(value) = record.get(&self.column) else {
            return false;
        };
        match &self.op {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::In(candidates) => candidates.contains(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A filtered, ordered, optionally limited read of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Filter, sort and truncate `rows` the way a backend would.
    ///
    /// Numbers compare numerically and strings lexically; rows missing the
    /// order column sort after all others in ascending order.
    pub fn evaluate(&self, rows: impl IntoIterator<Item = Record>) -> Vec<Record> {
        let mut rows: Vec<Record> = rows.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(order) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, Some(_)) => Ordering::Greater,
        (Some(_), Some(Value::Null) | None) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

// ── Collaborators ───────────────────────────────────────────────────

/// Who is viewing. Consulted synchronously before every mutation.
pub trait IdentityProvider: Send + Sync {
    fn current_viewer(&self) -> Option<Viewer>;
}

/// Accepts inserts and deletes. Resolves with the written row for inserts.
#[async_trait]
pub trait MutationSink: Send + Sync {
    async fn mutate(&self, mutation: Mutation) -> Result<Option<Record>, RemoteError>;
}

/// Answers filtered, ordered reads.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn query(&self, query: Query) -> Result<Vec<Record>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Record> {
        vec![
            record(json!({"id": "a", "post_id": "p1", "created_at": "2024-01-02"})),
            record(json!({"id": "b", "post_id": "p2", "created_at": "2024-01-01"})),
            record(json!({"id": "c", "post_id": "p1", "created_at": "2024-01-03"})),
            record(json!({"id": "d", "post_id": "p1"})),
        ]
    }

    fn ids(rows: &[Record]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn eq_filter_and_ascending_order() {
        let q = Query::table(table::COMMENTS)
            .filter(Filter::eq("post_id", "p1"))
            .order_by("created_at", true);
        assert_eq!(ids(&q.evaluate(rows())), vec!["a", "c", "d"]);
    }

    #[test]
    fn descending_puts_missing_first() {
        let q = Query::table(table::COMMENTS).order_by("created_at", false);
        assert_eq!(ids(&q.evaluate(rows())), vec!["d", "c", "a", "b"]);
    }

    #[test]
    fn in_filter_and_limit() {
        let q = Query::table(table::COMMENTS)
            .filter(Filter::is_in("id", ["b", "c", "x"]))
            .order_by("created_at", true)
            .limit(1);
        assert_eq!(ids(&q.evaluate(rows())), vec!["b"]);
    }

    #[test]
    fn numbers_compare_numerically() {
        let rows = vec![
            record(json!({"id": "x", "likes_count": 10})),
            record(json!({"id": "y", "likes_count": 9})),
        ];
        let q = Query::table(table::POSTS).order_by("likes_count", true);
        assert_eq!(ids(&q.evaluate(rows)), vec!["y", "x"]);
    }

    #[test]
    fn filter_on_missing_column_never_matches() {
        let f = Filter::eq("user_id", "u1");
        assert!(!f.matches(&record(json!({"id": "a"}))));
    }

    #[test]
    fn mutation_constructors() {
        let m = Mutation::delete(table::LIKES, record(json!({"user_id": "u1", "post_id": "p1"})));
        assert_eq!(m.kind, MutationKind::Delete);
        assert_eq!(m.table, "likes");
        assert_eq!(m.payload.len(), 2);
    }
}

//! Test fixture: a [`TableBackend`] over a [`MemoryStore`], wrapped in
//! collaborators that can fail on demand or hold mutations at a gate.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrets_feed::remote::{record, table};
use secrets_feed::{
    FeedConfig, Mutation, MutationSink, Query, QuerySource, Record, RemoteError, SecretsApp,
    SessionIdentity, TableBackend, UserProfile, Viewer,
};
use secrets_kv::MemoryStore;
use serde_json::json;
use tokio::sync::Semaphore;

/// Mutation sink that records calls, can fail, and can hold each call
/// until the test releases it.
pub struct ScriptedSink {
    inner: Arc<TableBackend>,
    calls: AtomicUsize,
    log: Mutex<Vec<Mutation>>,
    fail_next: AtomicUsize,
    fail_all: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
}

impl ScriptedSink {
    fn new(inner: Arc<TableBackend>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<Mutation> {
        self.log.lock().unwrap().clone()
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn fail_all(&self, on: bool) {
        self.fail_all.store(on, Ordering::SeqCst);
    }

    /// Hold every following call until [`release`](Self::release).
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let `n` held calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Wait until `n` calls have reached the sink.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {n} mutation calls, saw {}", self.calls());
    }
}

#[async_trait]
impl MutationSink for ScriptedSink {
    async fn mutate(&self, mutation: Mutation) -> Result<Option<Record>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(mutation.clone());
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }
        let fail_one = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_one || self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("network unreachable".into()));
        }
        self.inner.mutate(mutation).await
    }
}

/// Query source that counts calls, can fail per table, and can hold a
/// table's queries after their rows are read.
pub struct ScriptedSource {
    inner: Arc<TableBackend>,
    calls: AtomicUsize,
    failing: Mutex<Vec<String>>,
    holding: Mutex<Option<String>>,
    held: AtomicUsize,
    gate: Semaphore,
}

impl ScriptedSource {
    fn new(inner: Arc<TableBackend>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing: Mutex::new(Vec::new()),
            holding: Mutex::new(None),
            held: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_table(&self, name: &str) {
        self.failing.lock().unwrap().push(name.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Hold queries on `name` once their rows are read, until
    /// [`release`](Self::release).
    pub fn hold_after_read(&self, name: &str) {
        *self.holding.lock().unwrap() = Some(name.to_string());
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Wait until `n` queries are parked at the gate.
    pub async fn wait_for_held(&self, n: usize) {
        for _ in 0..500 {
            if self.held.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {n} held queries, saw {}", self.held.load(Ordering::SeqCst));
    }
}

#[async_trait]
impl QuerySource for ScriptedSource {
    async fn query(&self, query: Query) -> Result<Vec<Record>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&query.table) {
            return Err(RemoteError::Transport("timed out".into()));
        }
        let hold = self.holding.lock().unwrap().as_deref() == Some(query.table.as_str());
        let rows = self.inner.query(query).await;
        if hold {
            self.held.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
        }
        rows
    }
}

pub struct Fixture {
    pub backend: Arc<TableBackend>,
    pub sink: Arc<ScriptedSink>,
    pub source: Arc<ScriptedSource>,
    pub identity: Arc<SessionIdentity>,
    pub app: SecretsApp,
}

pub const VIEWER: &str = "u1";
pub const OTHER: &str = "u2";

impl Fixture {
    /// Two users, signed in as `u1`.
    pub async fn new() -> Self {
        Self::with_config(FeedConfig::default()).await
    }

    pub async fn with_config(config: FeedConfig) -> Self {
        let backend = Arc::new(TableBackend::new(Arc::new(MemoryStore::new())));
        let sink = Arc::new(ScriptedSink::new(Arc::clone(&backend)));
        let source = Arc::new(ScriptedSource::new(Arc::clone(&backend)));

        let viewer = user(VIEWER, "SilentFox_101", "#FF0050");
        let other = user(OTHER, "NeonOwl_202", "#00F2EA");
        for profile in [&viewer, &other] {
            backend
                .mutate(Mutation::insert(
                    table::USERS,
                    record(serde_json::to_value(profile).unwrap()),
                ))
                .await
                .unwrap();
        }

        let identity = Arc::new(SessionIdentity::signed_in(Viewer::from_profile(&viewer)));
        let app = SecretsApp::new(
            identity.clone(),
            sink.clone(),
            source.clone(),
            config,
        );
        Self {
            backend,
            sink,
            source,
            identity,
            app,
        }
    }

    /// Insert a post directly, bypassing the client. `n` orders posts by
    /// creation time.
    pub async fn seed_post(&self, author: &str, n: u32, content: &str) -> String {
        self.seed_post_row(json!({
            "id": format!("p{n}"),
            "user_id": author,
            "content": content,
            "created_at": format!("2024-01-01T00:00:{n:02}Z"),
        }))
        .await
    }

    pub async fn seed_post_row(&self, row: serde_json::Value) -> String {
        let written = self
            .backend
            .mutate(Mutation::insert(table::POSTS, record(row)))
            .await
            .unwrap()
            .unwrap();
        written["id"].as_str().unwrap().to_string()
    }

    pub async fn seed_like(&self, user: &str, post: &str) {
        self.backend
            .mutate(Mutation::insert(
                table::LIKES,
                record(json!({ "user_id": user, "post_id": post })),
            ))
            .await
            .unwrap();
    }

    pub async fn seed_comment(&self, user: &str, post: &str, n: u32, content: &str) {
        self.backend
            .mutate(Mutation::insert(
                table::COMMENTS,
                record(json!({
                    "user_id": user,
                    "post_id": post,
                    "content": content,
                    "created_at": format!("2024-01-02T00:00:{n:02}Z"),
                })),
            ))
            .await
            .unwrap();
    }

    /// The post's counters as stored by the backend.
    pub fn stored_counts(&self, post: &str) -> (u64, u64) {
        let row = self.backend.get(table::POSTS, post).unwrap().unwrap();
        (
            row["likes_count"].as_u64().unwrap(),
            row["comments_count"].as_u64().unwrap(),
        )
    }

    pub async fn like_rows(&self, user: &str, post: &str) -> usize {
        self.backend
            .query(
                Query::table(table::LIKES)
                    .filter(secrets_feed::Filter::eq("user_id", user))
                    .filter(secrets_feed::Filter::eq("post_id", post)),
            )
            .await
            .unwrap()
            .len()
    }
}

pub fn user(id: &str, handle: &str, color: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        handle: handle.into(),
        avatar_color: color.into(),
        bio: None,
        created_at: "2024-01-01T00:00:00Z".into(),
    }
}

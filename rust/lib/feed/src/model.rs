//! Domain types: posts, likes, comments, viewers.
//!
//! `*Row` types mirror the remote tables one-to-one and are decoded from
//! [`Record`](crate::remote::Record)s; the other types are what the client
//! keeps in view state.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current time as RFC 3339 UTC with nanoseconds.
///
/// Fixed width and `Z` suffix, so lexical order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ── Remote rows ─────────────────────────────────────────────────────

/// A row of the `posts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub comments_count: u32,
}

/// A row of the `comments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

/// A row of the `likes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRow {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
}

/// A row of the `users` table: the minimal anonymous profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub handle: String,
    pub avatar_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

// ── Viewer ──────────────────────────────────────────────────────────

/// The authenticated user performing interactions.
///
/// Display attributes are optional: a freshly signed-in viewer may not have
/// their profile cached yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub handle: Option<String>,
    pub avatar_color: Option<String>,
}

impl Viewer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: None,
            avatar_color: None,
        }
    }

    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            handle: Some(profile.handle.clone()),
            avatar_color: Some(profile.avatar_color.clone()),
        }
    }
}

// ── Posts ───────────────────────────────────────────────────────────

/// A post as shown in a feed, with its author joined in.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author_handle: String,
    pub author_avatar_color: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub like_count: u32,
    pub comment_count: u32,
    pub liked_by_viewer: bool,
}

impl Post {
    pub fn like_state(&self) -> LikeState {
        LikeState {
            liked: self.liked_by_viewer,
            count: self.like_count,
        }
    }
}

/// The viewer's like flag and the post's like count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LikeState {
    pub liked: bool,
    pub count: u32,
}

impl LikeState {
    pub fn new(liked: bool, count: u32) -> Self {
        Self { liked, count }
    }

    /// The state after one toggle. Counts never go below zero.
    pub fn toggled(self) -> Self {
        if self.liked {
            Self {
                liked: false,
                count: self.count.saturating_sub(1),
            }
        } else {
            Self {
                liked: true,
                count: self.count.saturating_add(1),
            }
        }
    }
}

// ── Comments ────────────────────────────────────────────────────────

/// Comment identity. Provisional ids are client-generated and can never
/// collide with server ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentId {
    Provisional(u64),
    Server(String),
}

impl CommentId {
    pub fn is_provisional(&self) -> bool {
        matches!(self, CommentId::Provisional(_))
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentId::Provisional(n) => write!(f, "tmp-{n}"),
            CommentId::Server(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: String,
    pub author_id: String,
    pub author_handle: String,
    pub author_avatar_color: String,
    pub content: String,
    pub created_at: String,
}

// ── Intents ─────────────────────────────────────────────────────────

/// What the viewer just did. Lives for one apply/confirm-or-revert cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationIntent {
    LikeOn,
    LikeOff,
    AddComment { provisional: u64 },
    /// Not optimistic; carried so a rejected post reports like the others.
    CreatePost,
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationIntent::LikeOn => f.write_str("like"),
            MutationIntent::LikeOff => f.write_str("unlike"),
            MutationIntent::AddComment { provisional } => {
                write!(f, "comment tmp-{provisional}")
            }
            MutationIntent::CreatePost => f.write_str("post"),
        }
    }
}

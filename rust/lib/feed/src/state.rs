//! View state published to the [`ViewStore`](secrets_view::ViewStore).
//!
//! Each type lives at a well-known path. Per-post state sits under
//! `post/{id}/` and is removed when the post is unmounted.

use crate::model::{Comment, LikeState, MutationIntent, Post, UserProfile};
use crate::view_model::CommentPanel;

/// Root of one post's state: `post/{id}`.
pub fn post_root(post_id: &str) -> String {
    format!("post/{post_id}")
}

impl LikeState {
    /// `post/{id}/like`
    pub fn path(post_id: &str) -> String {
        format!("post/{post_id}/like")
    }
}

/// One post's comment panel as the renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentsView {
    pub panel: CommentPanel,
    pub count: u32,
    pub comments: Vec<Comment>,
    pub draft: String,
}

impl CommentsView {
    /// `post/{id}/comments`
    pub fn path(post_id: &str) -> String {
        format!("post/{post_id}/comments")
    }
}

/// Home feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedState {
    pub items: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
}

impl FeedState {
    pub const PATH: &'static str = "feed/state";
}

/// Explore grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExploreState {
    pub tag: Option<String>,
    pub items: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ExploreState {
    pub const PATH: &'static str = "explore/state";
}

/// The viewer's own profile page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileState {
    pub profile: UserProfile,
    pub posts: Vec<Post>,
}

impl ProfileState {
    pub const PATH: &'static str = "profile/state";
}

/// New-post form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposeState {
    pub busy: bool,
    pub error: Option<String>,
}

impl ComposeState {
    pub const PATH: &'static str = "compose/state";
}

/// Transient feedback after a reverted mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub post_id: String,
    pub intent: MutationIntent,
    pub message: String,
}

impl Notice {
    pub const PATH: &'static str = "notice/state";
}

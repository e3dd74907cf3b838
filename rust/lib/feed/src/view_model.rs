//! Per-post view model.
//!
//! A [`PostViewModel`] exists while its post is mounted (on screen) and
//! exclusively owns that post's local state: the like flag and count, the
//! comment list and panel, and the comment draft. The coordinator is the
//! only writer.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use crate::model::{Comment, CommentId, LikeState, Post};
use crate::state::CommentsView;

/// Whether a post's comment list has been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
}

/// Comment panel: `Hidden → Loading → Loaded` on first reveal, then cached.
/// Collapsing hides the panel without discarding the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommentPanel {
    pub visible: bool,
    pub load: LoadPhase,
}

impl CommentPanel {
    pub fn is_hidden(&self) -> bool {
        !self.visible
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostViewState {
    pub post: Post,
    pub like: LikeState,
    pub comment_count: u32,
    /// Oldest first; provisional comments sit at the tail.
    pub comments: Vec<Comment>,
    pub panel: CommentPanel,
    pub draft: String,
    /// Provisional comment ids whose insert has not resolved yet.
    pending: BTreeSet<u64>,
    /// Bumped whenever a like or comment is applied, confirmed or reverted.
    revision: u64,
}

impl PostViewState {
    fn seeded(post: Post) -> Self {
        Self {
            like: post.like_state(),
            comment_count: post.comment_count,
            comments: Vec::new(),
            panel: CommentPanel::default(),
            draft: String::new(),
            pending: BTreeSet::new(),
            revision: 0,
            post,
        }
    }

    pub fn pending_comments(&self) -> usize {
        self.pending.len()
    }

    pub fn comments_view(&self) -> CommentsView {
        CommentsView {
            panel: self.panel,
            count: self.comment_count,
            comments: self.comments.clone(),
            draft: self.draft.clone(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_like(&mut self, like: LikeState) {
        self.like = like;
        self.revision += 1;
    }

    /// A remote mutation resolved without changing local values.
    pub(crate) fn settle(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn append_provisional(&mut self, provisional: u64, comment: Comment) {
        self.revision += 1;
        self.comments.push(comment);
        self.comment_count = self.comment_count.saturating_add(1);
        self.pending.insert(provisional);
        self.draft.clear();
    }

    /// The insert for `provisional` resolved successfully.
    pub(crate) fn confirm_provisional(&mut self, provisional: u64) {
        self.revision += 1;
        self.pending.remove(&provisional);
    }

    /// Undo [`append_provisional`](Self::append_provisional). The count only
    /// drops if the record was still in the list.
    pub(crate) fn revert_provisional(&mut self, provisional: u64) -> bool {
        self.revision += 1;
        self.pending.remove(&provisional);
        let id = CommentId::Provisional(provisional);
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        let removed = self.comments.len() != before;
        if removed {
            self.comment_count = self.comment_count.saturating_sub(1);
        }
        removed
    }

    /// Replace the list with an authoritative one.
    ///
    /// Provisional comments still awaiting their insert are kept after the
    /// server's records; everything else local is discarded.
    pub(crate) fn replace_comments(&mut self, fresh: Vec<Comment>) {
        let pending = &self.pending;
        let in_flight: Vec<Comment> = self
            .comments
            .drain(..)
            .filter(|c| matches!(c.id, CommentId::Provisional(n) if pending.contains(&n)))
            .collect();
        self.comments = fresh;
        self.comments.extend(in_flight);
        self.comment_count = u32::try_from(self.comments.len()).unwrap_or(u32::MAX);
        self.panel.load = LoadPhase::Loaded;
    }
}

pub struct PostViewModel {
    id: String,
    state: Mutex<PostViewState>,
    /// Held for the whole apply/confirm-or-revert cycle of a like toggle.
    like_lane: tokio::sync::Mutex<()>,
}

impl PostViewModel {
    pub fn new(post: Post) -> Self {
        Self {
            id: post.id.clone(),
            state: Mutex::new(PostViewState::seeded(post)),
            like_lane: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&self) -> PostViewState {
        self.lock().clone()
    }

    pub fn like(&self) -> LikeState {
        self.lock().like
    }

    pub fn panel(&self) -> CommentPanel {
        self.lock().panel
    }

    pub fn comments_view(&self) -> CommentsView {
        self.lock().comments_view()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// True while a like toggle for this post is waiting on the backend.
    pub fn like_in_flight(&self) -> bool {
        self.like_lane.try_lock().is_err()
    }

    /// Wait until no other toggle is in flight, then hold the lane.
    pub(crate) async fn enter_like_lane(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.like_lane.lock().await
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut PostViewState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Refresh from a copy of the post fetched when the model was at
    /// revision `seen` (`None` if it was not mounted yet).
    ///
    /// Counts and the like flag are only taken from the fetch when no
    /// mutation is in flight and none applied or settled since `seen`;
    /// otherwise the local values stand. A cached comment list whose size
    /// disagrees with the fetched count is marked stale so the next reveal
    /// refetches it.
    pub(crate) fn reseed(&self, post: Post, seen: Option<u64>) {
        let idle = !self.like_in_flight();
        let mut state = self.lock();
        if idle && state.pending.is_empty() && seen == Some(state.revision) {
            state.like = post.like_state();
            state.comment_count = post.comment_count;
            let cached = u32::try_from(state.comments.len()).unwrap_or(u32::MAX);
            if state.panel.load == LoadPhase::Loaded && cached != post.comment_count {
                state.panel.load = LoadPhase::NotLoaded;
            }
        }
        state.post = post;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PostViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

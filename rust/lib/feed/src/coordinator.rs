//! Optimistic likes and comments.
//!
//! Every interaction follows the same cycle: apply the change to the post's
//! view model and publish it, send the remote mutation, then either keep the
//! change (reconciling with server data where there is any) or restore the
//! pre-change values and publish a [`Notice`]. Remote failures never escape
//! as panics; they come back as [`FeedError`] values after the revert.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use secrets_view::ViewStore;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::{FeedError, Precondition};
use crate::model::{
    now_timestamp, Comment, CommentId, CommentRow, LikeState, MutationIntent, Post, UserProfile,
    Viewer,
};
use crate::remote::{
    decode, record, table, Filter, IdentityProvider, Mutation, MutationSink, Query, QuerySource,
};
use crate::state::{post_root, CommentsView, Notice};
use crate::view_model::{CommentPanel, LoadPhase, PostViewModel, PostViewState};

/// Result of a comment submission that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSubmission {
    /// The provisional id the comment was shown under.
    pub provisional: u64,
    /// False when the insert succeeded but the follow-up list fetch did not;
    /// the list then still shows the provisional record.
    pub reconciled: bool,
    /// Comment count after the submission settled.
    pub count: u32,
}

pub struct OptimisticMutationCoordinator {
    identity: Arc<dyn IdentityProvider>,
    sink: Arc<dyn MutationSink>,
    source: Arc<dyn QuerySource>,
    views: Arc<ViewStore>,
    config: FeedConfig,
    posts: RwLock<HashMap<String, Arc<PostViewModel>>>,
    next_provisional: AtomicU64,
}

impl OptimisticMutationCoordinator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sink: Arc<dyn MutationSink>,
        source: Arc<dyn QuerySource>,
        views: Arc<ViewStore>,
        config: FeedConfig,
    ) -> Self {
        // Clock-seeded; provisional ids only need to be unique per process.
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(1);
        Self {
            identity,
            sink,
            source,
            views,
            config,
            posts: RwLock::new(HashMap::new()),
            next_provisional: AtomicU64::new(seed),
        }
    }

    pub fn views(&self) -> &Arc<ViewStore> {
        &self.views
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub(crate) fn sink(&self) -> &dyn MutationSink {
        self.sink.as_ref()
    }

    pub(crate) fn source(&self) -> &dyn QuerySource {
        self.source.as_ref()
    }

    pub(crate) fn viewer(&self) -> Result<Viewer, FeedError> {
        self.identity
            .current_viewer()
            .ok_or(FeedError::PreconditionNotMet(Precondition::NoViewer))
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Mount a post: create its view model, or refresh the existing one.
    pub fn mount(&self, post: Post) -> Arc<PostViewModel> {
        let seen = self.view_model(&post.id).map(|vm| vm.revision());
        self.mount_fetched(post, seen)
    }

    /// Revision of every mounted post. Captured before a list fetch and
    /// handed back to [`mount_fetched`](Self::mount_fetched).
    pub(crate) fn revisions(&self) -> HashMap<String, u64> {
        self.posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, vm)| (id.clone(), vm.revision()))
            .collect()
    }

    /// Mount a post fetched while its model was at revision `seen`.
    pub(crate) fn mount_fetched(&self, post: Post, seen: Option<u64>) -> Arc<PostViewModel> {
        let vm = {
            let mut posts = self.posts.write().unwrap_or_else(PoisonError::into_inner);
            match posts.get(&post.id) {
                Some(existing) => {
                    let existing = Arc::clone(existing);
                    existing.reseed(post, seen);
                    existing
                }
                None => {
                    let vm = Arc::new(PostViewModel::new(post));
                    posts.insert(vm.id().to_string(), Arc::clone(&vm));
                    vm
                }
            }
        };
        self.publish_like(&vm);
        self.publish_comments(&vm);
        vm
    }

    /// Drop a post's view model and its published state.
    ///
    /// Mutations already in flight still run to completion against the
    /// detached model; they just stop publishing.
    pub fn unmount(&self, post_id: &str) -> bool {
        let removed = self
            .posts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(post_id)
            .is_some();
        if removed {
            self.views.remove_tree(&post_root(post_id));
            debug!(post_id, "post unmounted");
        }
        removed
    }

    pub fn view_model(&self, post_id: &str) -> Option<Arc<PostViewModel>> {
        self.posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(post_id)
            .cloned()
    }

    pub fn is_mounted(&self, post_id: &str) -> bool {
        self.view_model(post_id).is_some()
    }

    /// Ids of every mounted post, sorted.
    pub fn mounted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn mounted_post(&self, post_id: &str) -> Result<Arc<PostViewModel>, FeedError> {
        self.view_model(post_id)
            .ok_or_else(|| FeedError::PostNotMounted(post_id.to_string()))
    }

    // ====================================================================
    // Likes
    // ====================================================================

    /// Flip the viewer's like on a post.
    ///
    /// A toggle issued while another is in flight for the same post waits
    /// for it to resolve, so local and remote state never diverge by more
    /// than one pending toggle.
    pub async fn toggle_like(&self, post_id: &str) -> Result<LikeState, FeedError> {
        let viewer = self.viewer()?;
        let vm = self.mounted_post(post_id)?;

        let _lane = vm.enter_like_lane().await;
        let before = vm.like();
        let after = before.toggled();
        let intent = if after.liked {
            MutationIntent::LikeOn
        } else {
            MutationIntent::LikeOff
        };

        vm.update(|s| s.set_like(after));
        self.publish_like(&vm);
        debug!(post_id, %intent, count = after.count, "like applied");

        let key = record(json!({ "user_id": viewer.id, "post_id": post_id }));
        let mutation = match intent {
            MutationIntent::LikeOn => Mutation::insert(table::LIKES, key),
            _ => Mutation::delete(table::LIKES, key),
        };

        match self.sink.mutate(mutation).await {
            Ok(_) => {
                vm.update(PostViewState::settle);
                Ok(after)
            }
            Err(source) => {
                vm.update(|s| s.set_like(before));
                self.publish_like(&vm);
                warn!(post_id, %intent, error = %source, "like reverted");
                self.publish_notice(post_id, intent, &source.to_string());
                Err(FeedError::RemoteMutationFailed { intent, source })
            }
        }
    }

    // ====================================================================
    // Comments
    // ====================================================================

    /// Store the comment input for a post.
    pub fn set_draft(&self, post_id: &str, text: &str) -> Result<(), FeedError> {
        let vm = self.mounted_post(post_id)?;
        vm.update(|s| s.draft = text.to_string());
        self.publish_comments(&vm);
        Ok(())
    }

    /// Post a comment, showing it immediately under a provisional id.
    pub async fn submit_comment(
        &self,
        post_id: &str,
        text: &str,
    ) -> Result<CommentSubmission, FeedError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedError::PreconditionNotMet(Precondition::EmptyComment));
        }
        let viewer = self.viewer()?;
        if text.chars().count() > self.config.max_comment_len {
            return Err(FeedError::Validation(format!(
                "comment exceeds {} characters",
                self.config.max_comment_len
            )));
        }
        let vm = self.mounted_post(post_id)?;

        let provisional = self.next_provisional.fetch_add(1, Ordering::Relaxed);
        let intent = MutationIntent::AddComment { provisional };
        let comment = Comment {
            id: CommentId::Provisional(provisional),
            post_id: post_id.to_string(),
            author_id: viewer.id.clone(),
            author_handle: viewer
                .handle
                .clone()
                .unwrap_or_else(|| self.config.placeholder_handle.clone()),
            author_avatar_color: viewer
                .avatar_color
                .clone()
                .unwrap_or_else(|| self.config.placeholder_avatar_color.clone()),
            content: text.to_string(),
            created_at: now_timestamp(),
        };
        vm.update(|s| s.append_provisional(provisional, comment));
        self.publish_comments(&vm);
        debug!(post_id, %intent, "comment applied");

        let row = record(json!({
            "post_id": post_id,
            "user_id": viewer.id,
            "content": text,
        }));
        if let Err(source) = self.sink.mutate(Mutation::insert(table::COMMENTS, row)).await {
            vm.update(|s| s.revert_provisional(provisional));
            self.publish_comments(&vm);
            warn!(post_id, %intent, error = %source, "comment reverted");
            self.publish_notice(post_id, intent, &source.to_string());
            return Err(FeedError::RemoteMutationFailed { intent, source });
        }
        vm.update(|s| s.confirm_provisional(provisional));

        let reconciled = match self.fetch_comments(post_id).await {
            Ok(fresh) => {
                vm.update(|s| s.replace_comments(fresh));
                true
            }
            Err(e) => {
                warn!(post_id, error = %e, "comment list refresh failed");
                false
            }
        };
        self.publish_comments(&vm);

        Ok(CommentSubmission {
            provisional,
            reconciled,
            count: vm.snapshot().comment_count,
        })
    }

    /// Show or hide a post's comments, fetching them on the first reveal.
    pub async fn toggle_comments(&self, post_id: &str) -> Result<CommentPanel, FeedError> {
        let vm = self.mounted_post(post_id)?;

        let fetch = vm.update(|s| {
            s.panel.visible = !s.panel.visible;
            let fetch = s.panel.visible && s.panel.load == LoadPhase::NotLoaded;
            if fetch {
                s.panel.load = LoadPhase::Loading;
            }
            fetch
        });
        self.publish_comments(&vm);
        if !fetch {
            return Ok(vm.panel());
        }

        match self.fetch_comments(post_id).await {
            Ok(fresh) => {
                vm.update(|s| s.replace_comments(fresh));
                self.publish_comments(&vm);
                Ok(vm.panel())
            }
            Err(e) => {
                vm.update(|s| {
                    if s.panel.load == LoadPhase::Loading {
                        s.panel.load = LoadPhase::NotLoaded;
                    }
                });
                self.publish_comments(&vm);
                warn!(post_id, error = %e, "comment fetch failed");
                Err(e)
            }
        }
    }

    /// All comments on a post, oldest first, with authors joined in.
    pub async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>, FeedError> {
        let rows = self
            .source
            .query(
                Query::table(table::COMMENTS)
                    .filter(Filter::eq("post_id", post_id))
                    .order_by("created_at", true),
            )
            .await
            .map_err(|e| FeedError::query(table::COMMENTS, e))?;
        let rows: Vec<CommentRow> = rows
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()
            .map_err(|e| FeedError::query(table::COMMENTS, e))?;

        let authors = self
            .profiles(rows.iter().map(|r| r.user_id.as_str()))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let author = authors.get(&row.user_id);
                Comment {
                    id: CommentId::Server(row.id),
                    post_id: row.post_id,
                    author_handle: author
                        .map(|a| a.handle.clone())
                        .unwrap_or_else(|| self.config.placeholder_handle.clone()),
                    author_avatar_color: author
                        .map(|a| a.avatar_color.clone())
                        .unwrap_or_else(|| self.config.placeholder_avatar_color.clone()),
                    author_id: row.user_id,
                    content: row.content,
                    created_at: row.created_at,
                }
            })
            .collect())
    }

    /// Profiles for the given user ids, keyed by id. Unknown ids are absent.
    pub(crate) async fn profiles<'a>(
        &self,
        ids: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, UserProfile>, FeedError> {
        let ids: HashSet<&str> = ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_unstable();

        let rows = self
            .source
            .query(Query::table(table::USERS).filter(Filter::is_in("id", ids)))
            .await
            .map_err(|e| FeedError::query(table::USERS, e))?;
        rows.into_iter()
            .map(|r| decode::<UserProfile>(r).map(|p| (p.id.clone(), p)))
            .collect::<Result<_, _>>()
            .map_err(|e| FeedError::query(table::USERS, e))
    }

    // ====================================================================
    // Publishing
    // ====================================================================

    /// Detached view models (unmounted mid-flight) do not publish.
    fn is_current(&self, vm: &Arc<PostViewModel>) -> bool {
        self.view_model(vm.id())
            .is_some_and(|current| Arc::ptr_eq(&current, vm))
    }

    fn publish_like(&self, vm: &Arc<PostViewModel>) {
        if self.is_current(vm) {
            self.views.publish(&LikeState::path(vm.id()), vm.like());
        }
    }

    fn publish_comments(&self, vm: &Arc<PostViewModel>) {
        if self.is_current(vm) {
            self.views
                .publish(&CommentsView::path(vm.id()), vm.comments_view());
        }
    }

    fn publish_notice(&self, post_id: &str, intent: MutationIntent, message: &str) {
        self.views.publish(
            Notice::PATH,
            Notice {
                post_id: post_id.to_string(),
                intent,
                message: message.to_string(),
            },
        );
    }

    /// Clear the transient notice.
    pub fn dismiss_notice(&self) {
        self.views.remove(Notice::PATH);
    }
}

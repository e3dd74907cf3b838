use std::sync::Arc;

use secrets_view::{SubscriptionId, ViewError, ViewStore, ViewValue};

use crate::config::FeedConfig;
use crate::coordinator::{CommentSubmission, OptimisticMutationCoordinator};
use crate::error::FeedError;
use crate::loader::FeedLoader;
use crate::model::{LikeState, Post};
use crate::remote::{IdentityProvider, MutationSink, QuerySource};
use crate::state::ProfileState;
use crate::view_model::CommentPanel;

/// Everything a renderer can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    LoadFeed,
    LoadExplore { tag: Option<String> },
    LoadProfile,
    LoadPost { post_id: String },
    ToggleLike { post_id: String },
    SetDraft { post_id: String, text: String },
    SubmitComment { post_id: String, text: String },
    ToggleComments { post_id: String },
    CreatePost {
        content: String,
        image_url: Option<String>,
        tags: Vec<String>,
    },
    Unmount { post_id: String },
    DismissNotice,
}

impl Request {
    /// Request path, for logging.
    pub fn path(&self) -> &'static str {
        match self {
            Request::LoadFeed => "feed/load",
            Request::LoadExplore { .. } => "explore/load",
            Request::LoadProfile => "profile/load",
            Request::LoadPost { .. } => "post/load",
            Request::ToggleLike { .. } => "post/like",
            Request::SetDraft { .. } => "post/draft",
            Request::SubmitComment { .. } => "post/comment",
            Request::ToggleComments { .. } => "post/comments/toggle",
            Request::CreatePost { .. } => "compose/submit",
            Request::Unmount { .. } => "post/unmount",
            Request::DismissNotice => "notice/dismiss",
        }
    }
}

/// What a request settled to. Renderers usually ignore this and read the
/// published state instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Posts(Vec<Post>),
    Post(Post),
    Profile(ProfileState),
    Like(LikeState),
    Comment(CommentSubmission),
    Panel(CommentPanel),
    Created { post_id: String },
    Unmounted(bool),
    Done,
}

/// The client core: typed requests in, published view state out.
///
/// ```ignore
/// let app = SecretsApp::new(identity, backend.clone(), backend, FeedConfig::default());
/// app.subscribe("post/+/like", |path, value| { /* redraw */ });
/// app.emit(Request::LoadFeed).await?;
/// app.emit(Request::ToggleLike { post_id }).await?;
/// ```
pub struct SecretsApp {
    views: Arc<ViewStore>,
    coordinator: Arc<OptimisticMutationCoordinator>,
    loader: FeedLoader,
}

impl SecretsApp {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sink: Arc<dyn MutationSink>,
        source: Arc<dyn QuerySource>,
        config: FeedConfig,
    ) -> Self {
        let views = Arc::new(ViewStore::new());
        let coordinator = Arc::new(OptimisticMutationCoordinator::new(
            identity,
            sink,
            source,
            Arc::clone(&views),
            config,
        ));
        Self {
            loader: FeedLoader::new(Arc::clone(&coordinator)),
            views,
            coordinator,
        }
    }

    pub fn views(&self) -> &Arc<ViewStore> {
        &self.views
    }

    pub fn coordinator(&self) -> &Arc<OptimisticMutationCoordinator> {
        &self.coordinator
    }

    pub fn loader(&self) -> &FeedLoader {
        &self.loader
    }

    // ====================================================================
    // State
    // ====================================================================

    pub fn get(&self, path: &str) -> Option<ViewValue> {
        self.views.get(path)
    }

    /// Typed read: `app.read::<FeedState>(FeedState::PATH)`.
    pub fn read<T: std::any::Any + Clone>(&self, path: &str) -> Option<T> {
        self.views.read(path)
    }

    pub fn try_read<T: std::any::Any + Clone>(&self, path: &str) -> Result<T, ViewError> {
        self.views.try_read(path)
    }

    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&str, &ViewValue) + Send + Sync + 'static,
    {
        self.views.subscribe(pattern, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.views.unsubscribe(id)
    }

    // ====================================================================
    // Requests
    // ====================================================================

    /// Run one request to completion.
    pub async fn emit(&self, request: Request) -> Result<Response, FeedError> {
        tracing::debug!(path = request.path(), "request");
        let c = &self.coordinator;
        Ok(match request {
            Request::LoadFeed => Response::Posts(self.loader.load_feed().await?),
            Request::LoadExplore { tag } => {
                Response::Posts(self.loader.load_explore(tag.as_deref()).await?)
            }
            Request::LoadProfile => Response::Profile(self.loader.load_profile().await?),
            Request::LoadPost { post_id } => Response::Post(self.loader.load_post(&post_id).await?),
            Request::ToggleLike { post_id } => Response::Like(c.toggle_like(&post_id).await?),
            Request::SetDraft { post_id, text } => {
                c.set_draft(&post_id, &text)?;
                Response::Done
            }
            Request::SubmitComment { post_id, text } => {
                Response::Comment(c.submit_comment(&post_id, &text).await?)
            }
            Request::ToggleComments { post_id } => {
                Response::Panel(c.toggle_comments(&post_id).await?)
            }
            Request::CreatePost {
                content,
                image_url,
                tags,
            } => Response::Created {
                post_id: self
                    .loader
                    .create_post(&content, image_url.as_deref(), &tags)
                    .await?,
            },
            Request::Unmount { post_id } => Response::Unmounted(self.loader.unmount(&post_id)),
            Request::DismissNotice => {
                c.dismiss_notice();
                Response::Done
            }
        })
    }
}

//! Client core for the anonymous secrets feed.
//!
//! The hosted backend owns the data; this crate owns what the viewer sees.
//! Likes and comments are applied to local view state first and then
//! confirmed remotely, reverting when the backend rejects them:
//!
//! - [`OptimisticMutationCoordinator`]: like toggles, comment submission,
//!   comment panels, per-post view models
//! - [`FeedLoader`]: feed, explore and profile lists, post creation
//! - [`SecretsApp`]: typed request dispatch over both
//! - [`TableBackend`]: local row tables standing in for the hosted backend
//!
//! All state transitions are published to a [`secrets_view::ViewStore`]
//! (see [`state`] for the paths).

pub mod app;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod loader;
pub mod model;
pub mod remote;
pub mod state;
pub mod view_model;

pub use app::{Request, Response, SecretsApp};
pub use backend::TableBackend;
pub use config::FeedConfig;
pub use coordinator::{CommentSubmission, OptimisticMutationCoordinator};
pub use error::{FeedError, Precondition};
pub use identity::SessionIdentity;
pub use loader::{FeedLoader, Surface};
pub use model::{Comment, CommentId, LikeState, MutationIntent, Post, UserProfile, Viewer};
pub use remote::{
    Filter, IdentityProvider, Mutation, MutationKind, MutationSink, Order, Query, QuerySource,
    Record, RemoteError,
};
pub use view_model::{CommentPanel, LoadPhase, PostViewModel, PostViewState};

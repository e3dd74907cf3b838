//! View state for the secrets client.
//!
//! Rust owns the state; a renderer only reads it. Every piece of view state
//! lives at a `/`-separated path and can be observed with MQTT-style
//! subscriptions:
//!
//! - `feed/state`: the home feed
//! - `post/{id}/like`: one post's like flag and count
//! - `post/{id}/comments`: one post's comment panel
//! - `post/+/like`: every mounted post's like state
//! - `post/#`: everything under `post/`
//!
//! ```ignore
//! let views = ViewStore::new();
//! views.subscribe("post/+/like", |path, value| {
//!     println!("{path} changed");
//! });
//! views.publish("post/p1/like", LikeView { liked: true, count: 11 });
//! ```

pub mod error;
pub mod store;
pub mod topic;

pub use error::ViewError;
pub use store::{ChangeHandler, SubscriptionId, ViewStore, ViewValue};
pub use topic::topic_matches;

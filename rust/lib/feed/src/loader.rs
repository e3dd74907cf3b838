//! Feed, explore and profile lists, and post creation.
//!
//! Every list load joins authors from `users` and the viewer's `likes`, then
//! mounts each post with the coordinator so its like and comment state is
//! live. Posts that drop out of every loaded surface are unmounted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::coordinator::OptimisticMutationCoordinator;
use crate::error::{FeedError, Precondition};
use crate::model::{LikeRow, MutationIntent, Post, PostRow, Viewer};
use crate::remote::{decode, record, table, Filter, Mutation, Query};
use crate::state::{ComposeState, ExploreState, FeedState, ProfileState};

/// A screen that holds mounted posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Feed,
    Explore,
    Profile,
    Detail,
}

/// Canonical tag form: lowercase with a single leading `#`.
/// Returns `None` for blank input.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let bare = tag.trim().trim_start_matches('#').trim();
    if bare.is_empty() {
        None
    } else {
        Some(format!("#{}", bare.to_lowercase()))
    }
}

pub struct FeedLoader {
    coordinator: Arc<OptimisticMutationCoordinator>,
    surfaces: RwLock<HashMap<Surface, HashSet<String>>>,
}

impl FeedLoader {
    pub fn new(coordinator: Arc<OptimisticMutationCoordinator>) -> Self {
        Self {
            coordinator,
            surfaces: RwLock::new(HashMap::new()),
        }
    }

    pub fn coordinator(&self) -> &Arc<OptimisticMutationCoordinator> {
        &self.coordinator
    }

    /// Newest posts, one page.
    pub async fn load_feed(&self) -> Result<Vec<Post>, FeedError> {
        let views = self.coordinator.views();
        let previous = views.read::<FeedState>(FeedState::PATH).unwrap_or_default();
        views.publish(
            FeedState::PATH,
            FeedState {
                loading: true,
                error: None,
                ..previous.clone()
            },
        );

        let seen = self.coordinator.revisions();
        match self.newest_posts().await {
            Ok(items) => {
                self.mount_all(Surface::Feed, &items, &seen);
                debug!(count = items.len(), "feed loaded");
                views.publish(
                    FeedState::PATH,
                    FeedState {
                        items: items.clone(),
                        loading: false,
                        error: None,
                    },
                );
                Ok(items)
            }
            Err(e) => {
                warn!(error = %e, "feed load failed");
                views.publish(
                    FeedState::PATH,
                    FeedState {
                        items: previous.items,
                        loading: false,
                        error: Some(e.to_string()),
                    },
                );
                Err(e)
            }
        }
    }

    /// Newest posts with a given tag, or with an image when no tag is given.
    pub async fn load_explore(&self, tag: Option<&str>) -> Result<Vec<Post>, FeedError> {
        let tag = tag.and_then(normalize_tag);
        let views = self.coordinator.views();
        let previous = views
            .read::<ExploreState>(ExploreState::PATH)
            .unwrap_or_default();
        views.publish(
            ExploreState::PATH,
            ExploreState {
                tag: tag.clone(),
                loading: true,
                error: None,
                ..previous.clone()
            },
        );

        let seen = self.coordinator.revisions();
        match self.explore_posts(tag.as_deref()).await {
            Ok(items) => {
                self.mount_all(Surface::Explore, &items, &seen);
                debug!(count = items.len(), tag = tag.as_deref(), "explore loaded");
                views.publish(
                    ExploreState::PATH,
                    ExploreState {
                        tag,
                        items: items.clone(),
                        loading: false,
                        error: None,
                    },
                );
                Ok(items)
            }
            Err(e) => {
                warn!(error = %e, "explore load failed");
                views.publish(
                    ExploreState::PATH,
                    ExploreState {
                        tag,
                        items: previous.items,
                        loading: false,
                        error: Some(e.to_string()),
                    },
                );
                Err(e)
            }
        }
    }

    /// The viewer's profile and their posts, newest first.
    pub async fn load_profile(&self) -> Result<ProfileState, FeedError> {
        let viewer = self.coordinator.viewer()?;
        let profile = self
            .coordinator
            .profiles(std::iter::once(viewer.id.as_str()))
            .await?
            .remove(&viewer.id)
            .ok_or_else(|| FeedError::Validation(format!("no profile for {}", viewer.id)))?;

        let seen = self.coordinator.revisions();
        let rows = self
            .post_rows(
                Query::table(table::POSTS)
                    .filter(Filter::eq("user_id", viewer.id.as_str()))
                    .order_by("created_at", false),
            )
            .await?;
        let posts = self.build_posts(&viewer, rows).await?;
        self.mount_all(Surface::Profile, &posts, &seen);

        let state = ProfileState { profile, posts };
        self.coordinator
            .views()
            .publish(ProfileState::PATH, state.clone());
        Ok(state)
    }

    /// A single post, mounted on its own.
    pub async fn load_post(&self, post_id: &str) -> Result<Post, FeedError> {
        let viewer = self.viewer_or_guest();
        let seen = self.coordinator.revisions();
        let rows = self
            .post_rows(Query::table(table::POSTS).filter(Filter::eq("id", post_id)))
            .await?;
        let post = self
            .build_posts(&viewer, rows)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::Validation(format!("post {post_id} not found")))?;
        self.mount_all(Surface::Detail, std::slice::from_ref(&post), &seen);
        Ok(post)
    }

    /// Publish a new post, then reload the feed.
    ///
    /// Not optimistic: nothing is shown until the backend accepts it.
    pub async fn create_post(
        &self,
        content: &str,
        image_url: Option<&str>,
        tags: &[String],
    ) -> Result<String, FeedError> {
        let viewer = self.coordinator.viewer()?;
        let content = content.trim();
        let image_url = image_url.map(str::trim).filter(|u| !u.is_empty());
        if content.is_empty() && image_url.is_none() {
            return Err(FeedError::PreconditionNotMet(Precondition::EmptyPost));
        }
        let max = self.coordinator.config().max_post_len;
        if content.chars().count() > max {
            let err = FeedError::Validation(format!("post exceeds {max} characters"));
            self.publish_compose(false, Some(err.to_string()));
            return Err(err);
        }
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
            if !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }

        self.publish_compose(true, None);
        let row = record(json!({
            "user_id": viewer.id,
            "content": content,
            "image_url": image_url,
            "tags": normalized,
        }));
        let written = match self
            .coordinator
            .sink()
            .mutate(Mutation::insert(table::POSTS, row))
            .await
        {
            Ok(written) => written,
            Err(source) => {
                self.publish_compose(false, Some(source.to_string()));
                warn!(error = %source, "post rejected");
                return Err(FeedError::RemoteMutationFailed {
                    intent: MutationIntent::CreatePost,
                    source,
                });
            }
        };
        self.publish_compose(false, None);

        let id = written
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(post_id = %id, "post created");

        if let Err(e) = self.load_feed().await {
            warn!(error = %e, "feed reload after post failed");
        }
        Ok(id)
    }

    fn publish_compose(&self, busy: bool, error: Option<String>) {
        self.coordinator
            .views()
            .publish(ComposeState::PATH, ComposeState { busy, error });
    }

    // ====================================================================
    // Helpers
    // ====================================================================

    /// Reads work signed out; the like flags just come back false.
    fn viewer_or_guest(&self) -> Viewer {
        self.coordinator
            .identity()
            .current_viewer()
            .unwrap_or_else(|| Viewer::new(""))
    }

    async fn newest_posts(&self) -> Result<Vec<Post>, FeedError> {
        let viewer = self.viewer_or_guest();
        let rows = self
            .post_rows(
                Query::table(table::POSTS)
                    .order_by("created_at", false)
                    .limit(self.coordinator.config().page_size),
            )
            .await?;
        self.build_posts(&viewer, rows).await
    }

    /// Newest page of posts carrying `tag`, or carrying an image when no tag
    /// is given. Matching happens before the page is cut, so older matches
    /// still fill it.
    async fn explore_posts(&self, tag: Option<&str>) -> Result<Vec<Post>, FeedError> {
        let viewer = self.viewer_or_guest();
        let rows: Vec<PostRow> = self
            .post_rows(Query::table(table::POSTS).order_by("created_at", false))
            .await?
            .into_iter()
            .filter(|row| match tag {
                Some(tag) => row
                    .tags
                    .iter()
                    .any(|t| normalize_tag(t).as_deref() == Some(tag)),
                None => row.image_url.is_some(),
            })
            .take(self.coordinator.config().page_size)
            .collect();
        self.build_posts(&viewer, rows).await
    }

    async fn post_rows(&self, query: Query) -> Result<Vec<PostRow>, FeedError> {
        self.coordinator
            .source()
            .query(query)
            .await
            .and_then(|rows| rows.into_iter().map(decode).collect())
            .map_err(|e| FeedError::query(table::POSTS, e))
    }

    /// Join authors and the viewer's likes onto post rows, keeping order.
    async fn build_posts(&self, viewer: &Viewer, rows: Vec<PostRow>) -> Result<Vec<Post>, FeedError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let authors = self
            .coordinator
            .profiles(rows.iter().map(|r| r.user_id.as_str()))
            .await?;

        let liked: HashSet<String> = if viewer.id.is_empty() {
            HashSet::new()
        } else {
            let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
            self.coordinator
                .source()
                .query(
                    Query::table(table::LIKES)
                        .filter(Filter::eq("user_id", viewer.id.as_str()))
                        .filter(Filter::is_in("post_id", ids)),
                )
                .await
                .and_then(|rows| rows.into_iter().map(decode::<LikeRow>).collect::<Result<Vec<_>, _>>())
                .map_err(|e| FeedError::query(table::LIKES, e))?
                .into_iter()
                .map(|l| l.post_id)
                .collect()
        };

        let config = self.coordinator.config();
        Ok(rows
            .into_iter()
            .map(|row| {
                let author = authors.get(&row.user_id);
                Post {
                    liked_by_viewer: liked.contains(&row.id),
                    author_handle: author
                        .map(|a| a.handle.clone())
                        .unwrap_or_else(|| config.placeholder_handle.clone()),
                    author_avatar_color: author
                        .map(|a| a.avatar_color.clone())
                        .unwrap_or_else(|| config.placeholder_avatar_color.clone()),
                    id: row.id,
                    author_id: row.user_id,
                    content: row.content,
                    image_url: row.image_url,
                    tags: row.tags,
                    created_at: row.created_at,
                    like_count: row.likes_count,
                    comment_count: row.comments_count,
                }
            })
            .collect())
    }

    /// Mount `posts` as the contents of `surface`, unmounting whatever no
    /// surface holds any more. `seen` holds the revisions captured before
    /// the posts were fetched.
    fn mount_all(&self, surface: Surface, posts: &[Post], seen: &HashMap<String, u64>) {
        for post in posts {
            self.coordinator
                .mount_fetched(post.clone(), seen.get(&post.id).copied());
        }
        let ids: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();

        let orphaned: Vec<String> = {
            let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
            let previous = surfaces.insert(surface, ids).unwrap_or_default();
            previous
                .into_iter()
                .filter(|id| !surfaces.values().any(|held| held.contains(id)))
                .collect()
        };
        for id in orphaned {
            self.coordinator.unmount(&id);
        }
    }

    /// Take a post off every surface and unmount it.
    pub fn unmount(&self, post_id: &str) -> bool {
        for ids in self
            .surfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .values_mut()
        {
            ids.remove(post_id);
        }
        self.coordinator.unmount(post_id)
    }

    /// Ids currently held by `surface`.
    pub fn surface(&self, surface: Surface) -> Vec<String> {
        let mut ids: Vec<String> = self
            .surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&surface)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tag("Confession").as_deref(), Some("#confession"));
        assert_eq!(normalize_tag("  #Night ").as_deref(), Some("#night"));
        assert_eq!(normalize_tag("##dream").as_deref(), Some("#dream"));
        assert_eq!(normalize_tag(" # "), None);
        assert_eq!(normalize_tag(""), None);
    }
}

//! Feed reads and interactions. Each returns the text to print.

use chrono::Utc;
use secrets_feed::state::{CommentsView, ProfileState};
use secrets_feed::{Request, Response};

use super::Session;
use crate::print;

fn unexpected(resp: Response) -> anyhow::Error {
    anyhow::anyhow!("unexpected response: {resp:?}")
}

pub async fn feed(s: &Session) -> anyhow::Result<String> {
    match s.app.emit(Request::LoadFeed).await? {
        Response::Posts(items) => Ok(print::posts(&items, Utc::now())),
        other => Err(unexpected(other)),
    }
}

pub async fn explore(s: &Session, tag: Option<String>) -> anyhow::Result<String> {
    match s.app.emit(Request::LoadExplore { tag }).await? {
        Response::Posts(items) => Ok(print::posts(&items, Utc::now())),
        other => Err(unexpected(other)),
    }
}

pub async fn profile(s: &Session) -> anyhow::Result<String> {
    let ProfileState { profile, posts } = match s.app.emit(Request::LoadProfile).await? {
        Response::Profile(state) => state,
        other => return Err(unexpected(other)),
    };
    let mut out = format!("{} ({})\n", profile.handle, profile.avatar_color);
    if let Some(bio) = &profile.bio {
        out.push_str(&format!("{bio}\n"));
    }
    out.push_str(&format!("{} secrets\n\n", posts.len()));
    out.push_str(&print::posts(&posts, Utc::now()));
    Ok(out)
}

pub async fn like(s: &Session, post_id: &str) -> anyhow::Result<String> {
    s.app
        .emit(Request::LoadPost {
            post_id: post_id.to_string(),
        })
        .await?;
    match s
        .app
        .emit(Request::ToggleLike {
            post_id: post_id.to_string(),
        })
        .await?
    {
        Response::Like(like) => Ok(format!(
            "{} {post_id}: {}",
            if like.liked { "liked" } else { "unliked" },
            print::like_line(like)
        )),
        other => Err(unexpected(other)),
    }
}

pub async fn comment(s: &Session, post_id: &str, text: &str) -> anyhow::Result<String> {
    s.app
        .emit(Request::LoadPost {
            post_id: post_id.to_string(),
        })
        .await?;
    let submission = match s
        .app
        .emit(Request::SubmitComment {
            post_id: post_id.to_string(),
            text: text.to_string(),
        })
        .await?
    {
        Response::Comment(submission) => submission,
        other => return Err(unexpected(other)),
    };
    let mut out = comments_text(s, post_id)?;
    if !submission.reconciled {
        out.push_str("\n(comment saved; list not refreshed)");
    }
    Ok(out)
}

pub async fn comments(s: &Session, post_id: &str) -> anyhow::Result<String> {
    s.app
        .emit(Request::LoadPost {
            post_id: post_id.to_string(),
        })
        .await?;
    s.app
        .emit(Request::ToggleComments {
            post_id: post_id.to_string(),
        })
        .await?;
    comments_text(s, post_id)
}

fn comments_text(s: &Session, post_id: &str) -> anyhow::Result<String> {
    let view = s
        .app
        .try_read::<CommentsView>(&CommentsView::path(post_id))?;
    Ok(print::comments(&view, Utc::now()))
}

pub async fn post(
    s: &Session,
    content: &str,
    image_url: Option<String>,
    tags: Vec<String>,
) -> anyhow::Result<String> {
    match s
        .app
        .emit(Request::CreatePost {
            content: content.to_string(),
            image_url,
            tags,
        })
        .await?
    {
        Response::Created { post_id } => Ok(format!("posted {post_id}")),
        other => Err(unexpected(other)),
    }
}

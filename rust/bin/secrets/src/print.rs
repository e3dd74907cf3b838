//! Plain-text rendering.

use chrono::{DateTime, Utc};
use secrets_feed::state::CommentsView;
use secrets_feed::{Comment, LikeState, Post};

/// `"5m ago"`, `"3h ago"`, or the date for anything older than a day.
/// Unparseable timestamps are shown as-is.
pub fn format_age(created_at: &str, now: DateTime<Utc>) -> String {
    let Ok(at) = DateTime::parse_from_rfc3339(created_at) else {
        return created_at.to_string();
    };
    let minutes = (now - at.with_timezone(&Utc)).num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        format!("{}h ago", minutes / 60)
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

pub fn like_line(like: LikeState) -> String {
    let heart = if like.liked { "♥" } else { "♡" };
    format!("{heart} {}", like.count)
}

pub fn post(p: &Post, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "[{}] {} · {}\n",
        p.id,
        p.author_handle,
        format_age(&p.created_at, now)
    );
    if !p.content.is_empty() {
        out.push_str(&format!("  {}\n", p.content));
    }
    if let Some(url) = &p.image_url {
        out.push_str(&format!("  <image {url}>\n"));
    }
    if !p.tags.is_empty() {
        out.push_str(&format!("  {}\n", p.tags.join(" ")));
    }
    out.push_str(&format!(
        "  {}  💬 {}",
        like_line(p.like_state()),
        p.comment_count
    ));
    out
}

pub fn posts(items: &[Post], now: DateTime<Utc>) -> String {
    if items.is_empty() {
        return "No secrets yet.".to_string();
    }
    items
        .iter()
        .map(|p| post(p, now))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn comment(c: &Comment, now: DateTime<Utc>) -> String {
    format!(
        "  {} ({}): {}",
        c.author_handle,
        format_age(&c.created_at, now),
        c.content
    )
}

pub fn comments(view: &CommentsView, now: DateTime<Utc>) -> String {
    let mut lines = vec![format!("{} comments", view.count)];
    lines.extend(view.comments.iter().map(|c| comment(c, now)));
    lines.join("\n")
}

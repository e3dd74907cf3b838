//! Demo data: anonymous users with generated handles, and a few posts.

use chrono::{Duration, SecondsFormat, Utc};
use secrets_feed::remote::{record, table};
use secrets_feed::{Mutation, MutationSink, RemoteError, UserProfile};
use serde_json::json;
use tracing::info;

pub const TAGS: [&str; 8] = [
    "#confession",
    "#secret",
    "#dream",
    "#night",
    "#anonymous",
    "#truth",
    "#love",
    "#life",
];

const ADJECTIVES: [&str; 8] = [
    "Silent", "Misty", "Neon", "Quiet", "Echo", "Velvet", "Hidden", "Solar",
];
const ANIMALS: [&str; 8] = ["Fox", "Raven", "Wolf", "Cat", "Owl", "Bear", "Hawk", "Swan"];
const COLORS: [&str; 6] = [
    "#FF0050", "#00F2EA", "#7B61FF", "#FFD700", "#00FF94", "#FF4D00",
];

const CONTENT: [&str; 4] = [
    "Sometimes I look at the stars and wonder if anyone is looking back.",
    "Just finished a huge project. Time to sleep for 2 days.",
    "I still have the note you passed me in seventh grade.",
    "I pretend to be busy so nobody sits next to me on the train.",
];

/// `AdjectiveAnimal_NNN`, stable for a given index.
pub fn handle(i: usize) -> String {
    let adj = ADJECTIVES[i % ADJECTIVES.len()];
    let animal = ANIMALS[(i / ADJECTIVES.len() + i * 3) % ANIMALS.len()];
    let num = 100 + (i * 137) % 900;
    format!("{adj}{animal}_{num}")
}

pub fn avatar_color(i: usize) -> &'static str {
    COLORS[i % COLORS.len()]
}

pub fn user(i: usize) -> UserProfile {
    UserProfile {
        id: format!("u{i}"),
        handle: handle(i),
        avatar_color: avatar_color(i).to_string(),
        bio: None,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub users_existing: usize,
    pub posts_created: usize,
}

/// Create `users` users (skipping ids that already exist) and `posts` posts
/// spread across them, newest last.
pub async fn run(
    sink: &dyn MutationSink,
    users: usize,
    posts: usize,
) -> anyhow::Result<SeedReport> {
    anyhow::ensure!(users > 0, "need at least one user");
    let mut report = SeedReport::default();

    for i in 0..users {
        let row = record(serde_json::to_value(user(i))?);
        match sink.mutate(Mutation::insert(table::USERS, row)).await {
            Ok(_) => report.users_created += 1,
            Err(RemoteError::Conflict(_)) => report.users_existing += 1,
            Err(e) => return Err(e.into()),
        }
    }

    let start = Utc::now() - Duration::minutes(posts as i64);
    for i in 0..posts {
        let created_at = start + Duration::minutes(i as i64);
        let image_url = (i % 2 == 0).then(|| format!("https://picsum.photos/seed/{}/400/500", i * 123));
        let row = record(json!({
            "user_id": format!("u{}", i % users),
            "content": CONTENT[i % CONTENT.len()],
            "image_url": image_url,
            "tags": [TAGS[(i * 5) % TAGS.len()]],
            "created_at": created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }));
        sink.mutate(Mutation::insert(table::POSTS, row)).await?;
        report.posts_created += 1;
    }

    info!(?report, "seeded");
    Ok(report)
}

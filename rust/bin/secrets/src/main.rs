//! `secrets`: anonymous secrets feed from the terminal.
//!
//! Runs the client core against a local redb database:
//!
//! ```text
//! secrets seed
//! secrets --as u1 feed
//! secrets --as u1 like <post-id>
//! secrets --as u1 comment <post-id> "me too"
//! ```

mod commands;
mod config;
mod print;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::{posts, seed, Session};
use config::CliConfig;

/// Anonymous secrets feed CLI.
#[derive(Parser, Debug)]
#[command(name = "secrets", about = "Anonymous secrets feed", version)]
struct Cli {
    /// Path to config file (default: ~/.secrets/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Database file (overrides config).
    #[arg(long = "db", global = true)]
    db: Option<String>,

    /// Act as this user id or handle (overrides config).
    #[arg(long = "as", global = true)]
    viewer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create demo users and posts.
    Seed {
        #[arg(long, default_value_t = 8)]
        users: usize,
        #[arg(long, default_value_t = 12)]
        posts: usize,
    },

    /// Remember a user to act as (saved in the config file).
    Use {
        /// User id or handle.
        user: String,
    },

    /// Newest secrets.
    Feed,

    /// Secrets with images, or with a tag.
    Explore {
        #[arg(long)]
        tag: Option<String>,
    },

    /// Your profile and posts.
    Profile,

    /// Toggle your like on a post.
    Like { post_id: String },

    /// Comment on a post.
    Comment { post_id: String, text: String },

    /// Show a post's comments.
    Comments { post_id: String },

    /// Share a secret.
    Post {
        content: String,
        #[arg(long)]
        image: Option<String>,
        /// Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(CliConfig::default_path);
    let mut config = CliConfig::load(&config_path)?;

    let db = config.resolve_db(cli.db.as_deref());
    let session = Session::open(&db, &config)?;

    // Seeding and choosing a user must work before the viewer exists.
    let acts = !matches!(cli.command, Commands::Seed { .. } | Commands::Use { .. });
    if let Some(who) = cli.viewer.as_deref().or(config.viewer.as_deref()).filter(|_| acts) {
        let profile = session.sign_in(who).await?;
        info!(handle = %profile.handle, "acting as");
    }

    let out = match cli.command {
        Commands::Seed { users, posts } => {
            let report = seed::run(session.backend.as_ref(), users, posts).await?;
            format!(
                "{} users created ({} already existed), {} posts created",
                report.users_created, report.users_existing, report.posts_created
            )
        }
        Commands::Use { user } => {
            let profile = commands::find_user(session.backend.as_ref(), &user)
                .await?
                .ok_or_else(|| anyhow::anyhow!("unknown user '{user}'"))?;
            config.viewer = Some(profile.id.clone());
            config.save(&config_path)?;
            format!("now acting as {} ({})", profile.handle, profile.id)
        }
        Commands::Feed => posts::feed(&session).await?,
        Commands::Explore { tag } => posts::explore(&session, tag).await?,
        Commands::Profile => posts::profile(&session).await?,
        Commands::Like { post_id } => posts::like(&session, &post_id).await?,
        Commands::Comment { post_id, text } => posts::comment(&session, &post_id, &text).await?,
        Commands::Comments { post_id } => posts::comments(&session, &post_id).await?,
        Commands::Post {
            content,
            image,
            tags,
        } => posts::post(&session, &content, image, tags).await?,
    };
    println!("{out}");

    Ok(())
}

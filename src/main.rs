//! activity-index CLI
//!
//! Runs one read or write against a storage directory and prints the result
//! as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Voters on a subject
//! activity-index votes https://example.com/post/1
//!
//! # Newest notifications, then the page after the last key seen
//! activity-index notifications alice@example.com --limit 10
//! activity-index notifications alice@example.com --lt 00000176b8e6a0000
//!
//! # Vote as alice
//! activity-index --storage-dir /data/index vote-put alice@example.com https://example.com/post/1 --down
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use activity_index::{
    Config, GetOptions, Identity, NotificationQuery, Services, Session, SubjectSummary, VoteInput,
    VoteValue,
};

#[derive(Parser, Debug)]
#[command(name = "activity-index")]
#[command(about = "Federated activity index reader")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "ACTIVITY_INDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "ACTIVITY_INDEX_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Domain for user URLs of identities without a host part
    #[arg(long, env = "ACTIVITY_INDEX_DOMAIN")]
    domain: Option<String>,

    /// Directory of replicated partitions to load on demand
    #[arg(long, env = "ACTIVITY_INDEX_EXTERNAL_DIR")]
    external_dir: Option<PathBuf>,

    /// Never load partitions that are not hosted here
    #[arg(long)]
    no_load_external: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upvoters and downvoters of a subject
    Votes { subject_url: String },

    /// Reactors of a subject grouped by reaction
    Reactions { subject_url: String },

    /// Indexed replies to a subject
    Replies { subject_url: String },

    /// Number of indexed replies to a subject
    ReplyCount { subject_url: String },

    /// Followers of an identity
    Followers { user_id: String },

    /// A page of notifications for a user
    Notifications {
        user_id: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Number of notifications in a page window
    CountNotifications {
        user_id: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Read the record a pointer URL names
    Get {
        pointer: String,
        /// Identity to load when the pointer's origin is unknown
        #[arg(long)]
        owner: Option<String>,
    },

    /// Record a vote as a hosted user
    VotePut {
        user_id: String,
        subject_url: String,
        /// Downvote instead of upvote
        #[arg(long)]
        down: bool,
        /// Author of the subject
        #[arg(long)]
        subject_author: Option<String>,
    },

    /// Remove a vote as a hosted user
    VoteDel { user_id: String, subject_url: String },
}

#[derive(Debug, clap::Args)]
struct PageArgs {
    /// Only keys older than this one
    #[arg(long)]
    lt: Option<String>,
    /// Only keys newer than this one
    #[arg(long)]
    gt: Option<String>,
    /// Only notifications before this time (RFC 3339)
    #[arg(long)]
    before: Option<DateTime<Utc>>,
    /// Only notifications from this time on (RFC 3339)
    #[arg(long)]
    after: Option<DateTime<Utc>>,
    /// Page size, 1 to 20
    #[arg(short, long)]
    limit: Option<i64>,
}

impl From<PageArgs> for NotificationQuery {
    fn from(page: PageArgs) -> Self {
        NotificationQuery {
            lt: page.lt,
            gt: page.gt,
            before: page.before,
            after: page.after,
            limit: page.limit,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("activity_index=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(domain) = args.domain {
        config.domain = domain;
    }
    if let Some(dir) = args.external_dir {
        config.external_partitions_dir = Some(dir);
    }
    if args.no_load_external {
        config.allow_external_load = false;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        domain = %config.domain,
        "Starting activity-index"
    );

    let services = Services::open(&config).context("opening storage")?;
    let _listeners = services.spawn_listeners();

    let opts = GetOptions {
        owner: None,
        no_load_external: !config.allow_external_load,
    };

    match args.command {
        Command::Votes { subject_url } => {
            print_json(&services.aggregates.get_votes_for_subject(&subject_url).await?)?
        }
        Command::Reactions { subject_url } => {
            print_json(&services.aggregates.get_reactions_for_subject(&subject_url).await?)?
        }
        Command::Replies { subject_url } => {
            print_json(&services.aggregates.get_replies_for_subject(&subject_url).await?)?
        }
        Command::ReplyCount { subject_url } => {
            print_json(&services.aggregates.get_reply_count(&subject_url).await?)?
        }
        Command::Followers { user_id } => {
            print_json(&services.aggregates.get_follower_ids(&Identity::new(user_id)).await?)?
        }
        Command::Notifications { user_id, page } => {
            let query = NotificationQuery::from(page);
            print_json(
                &services
                    .notifications
                    .get_notifications(&Identity::new(user_id), &query)
                    .await?,
            )?
        }
        Command::CountNotifications { user_id, page } => {
            let query = NotificationQuery::from(page);
            print_json(
                &services
                    .notifications
                    .count_notifications(&Identity::new(user_id), &query)
                    .await?,
            )?
        }
        Command::Get { pointer, owner } => {
            let opts = GetOptions {
                owner: owner.map(Identity::new),
                ..opts
            };
            let resolved = services.resolver.db_get(&pointer, &opts).await?;
            print_json(&resolved.entry)?
        }
        Command::VotePut {
            user_id,
            subject_url,
            down,
            subject_author,
        } => {
            let session = Session::new(user_id);
            let vote = VoteInput {
                subject: subject_author.map(|author| SubjectSummary {
                    db_url: subject_url.clone(),
                    author_id: Some(Identity::new(author)),
                }),
                subject_url,
                vote: if down { VoteValue::Down } else { VoteValue::Up },
            };
            print_json(&services.votes.put_vote(Some(&session), vote).await?)?
        }
        Command::VoteDel { user_id, subject_url } => {
            let session = Session::new(user_id);
            let existed = services.votes.delete_vote(Some(&session), &subject_url).await?;
            print_json(&serde_json::json!({ "key": subject_url, "deleted": existed }))?
        }
    }

    services.flush().await?;
    Ok(())
}

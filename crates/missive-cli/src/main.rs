mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use missive_core::{Store, ThreadDepth, UnreadOrder};
use missive_db::Database;
use missive_types::models::NewMessage;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "missive")]
#[command(about = "Direct messages with edit history, notifications and threads")]
struct Cli {
    /// SQLite database path (overrides MISSIVE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Reply levels to resolve in threads (overrides MISSIVE_THREAD_DEPTH)
    #[arg(long, global = true)]
    depth: Option<ThreadDepth>,

    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Send a message, optionally as a reply
    Send {
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
        /// Parent message id
        #[arg(long)]
        reply_to: Option<Uuid>,
        content: String,
    },

    /// Replace a message's content (records edit history)
    Edit { message_id: Uuid, content: String },

    /// Mark a message as read
    Read { message_id: Uuid },

    /// Delete a message and its replies
    Delete { message_id: Uuid },

    /// List unread messages addressed to a user
    Unread {
        user_id: Uuid,
        #[arg(long, conflicts_with = "newest_first")]
        oldest_first: bool,
        #[arg(long)]
        newest_first: bool,
    },

    /// Show the threaded conversation between two users
    Thread {
        user1: Uuid,
        user2: Uuid,
        /// Identity of the caller; must be one of the two participants
        #[arg(long = "as")]
        requester: Uuid,
    },

    /// Show the edit history of a message
    History { message_id: Uuid },

    /// List a user's notifications, newest first
    Notifications {
        user_id: Uuid,
        #[arg(long)]
        unread: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Add { username: String },
    /// Show a user by id or username
    Show { user: String },
    /// Delete a user and every message they sent or received
    Delete { user_id: Uuid },
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries JSON only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "missive=info,missive_core=info,missive_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.db.clone(), cli.depth);

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let store = Store::with_standard_hooks(db);
    info!(hooks = ?store.hooks().names(), "Store ready");

    run(&store, &config, cli.command, cli.pretty)
}

fn run(store: &Store, config: &Config, command: Commands, pretty: bool) -> Result<()> {
    match command {
        Commands::User { command } => match command {
            UserCommands::Add { username } => print(&store.create_user(&username)?, pretty),
            UserCommands::Show { user } => {
                let found = match user.parse::<Uuid>() {
                    Ok(id) => store.get_user(id)?,
                    Err(_) => store.find_user(&user)?,
                };
                match found {
                    Some(u) => print(&u, pretty),
                    None => bail!("user not found: {}", user),
                }
            }
            UserCommands::Delete { user_id } => {
                if !store.delete_user(user_id)? {
                    bail!("user not found: {}", user_id);
                }
                print(&serde_json::json!({ "deleted": user_id }), pretty)
            }
        },
        Commands::Send { from, to, reply_to, content } => {
            let mut new = NewMessage::new(from, to, content);
            new.parent_message_id = reply_to;
            print(&store.send_message(new)?, pretty)
        }
        Commands::Edit { message_id, content } => print(&store.edit_message(message_id, content)?, pretty),
        Commands::Read { message_id } => print(&store.mark_message_read(message_id)?, pretty),
        Commands::Delete { message_id } => {
            if !store.delete_message(message_id)? {
                bail!("message not found: {}", message_id);
            }
            print(&serde_json::json!({ "deleted": message_id }), pretty)
        }
        Commands::Unread { user_id, oldest_first, newest_first } => {
            let order = if oldest_first {
                UnreadOrder::OldestFirst
            } else if newest_first {
                UnreadOrder::NewestFirst
            } else {
                UnreadOrder::Unspecified
            };
            print(&store.unread_for_user(user_id, order)?, pretty)
        }
        Commands::Thread { user1, user2, requester } => {
            let threads = store.threaded_conversation(user1, user2, requester, config.thread_depth)?;
            print(&threads, pretty)
        }
        Commands::History { message_id } => print(&store.message_history(message_id)?, pretty),
        Commands::Notifications { user_id, unread } => {
            print(&store.notifications_for_user(user_id, unread)?, pretty)
        }
    }
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

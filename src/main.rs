//! # Mail Mirror CLI
//!
//! Operator entry point: registers accounts, runs sync passes, and queries the
//! local mirror. Results are printed as JSON on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailmirror::{
    MailboxSync, SyncOptions,
    config::ConfigLoader,
    db,
    repositories::{AccountRepository, MirrorRepository},
    telemetry,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mailmirror", version, about = "Mirror a Gmail mailbox into a local database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Manage mirrored accounts
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Run one sync pass for an account
    Sync {
        #[arg(long)]
        account: Uuid,
        /// Ignore the stored cursor and run a full sync
        #[arg(long)]
        force_full: bool,
    },
    /// Add a label to messages remotely and in the mirror
    ApplyLabel {
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        label: String,
        #[arg(required = true)]
        message_ids: Vec<String>,
    },
    /// Per-label message and unread counts
    Stats {
        #[arg(long)]
        account: Uuid,
    },
    /// List mirrored messages, newest first
    Messages {
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
    /// List mirrored labels
    Labels {
        #[arg(long)]
        account: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum AccountCommand {
    /// Register an account from a refresh token obtained out of band
    Add {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        refresh_token: String,
    },
    /// List registered accounts
    List,
}

#[derive(Serialize)]
struct AccountView {
    id: Uuid,
    email_address: Option<String>,
    sync_cursor: Option<String>,
    last_full_sync_at: Option<String>,
}

impl From<mailmirror::models::account::Model> for AccountView {
    fn from(model: mailmirror::models::account::Model) -> Self {
        Self {
            id: model.id,
            email_address: model.email_address,
            sync_cursor: model.sync_cursor,
            last_full_sync_at: model.last_full_sync_at.map(|at| at.to_rfc3339()),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    if let Ok(redacted) = config.redacted_json() {
        info!(profile = %config.profile, config = %redacted, "configuration loaded");
    }

    let db = Arc::new(
        db::init_pool(&config)
            .await
            .context("initializing database connection pool")?,
    );

    if let Command::Migrate = cli.command {
        db::run_migrations(&db).await.context("running migrations")?;
        println!("Migrations applied.");
        return Ok(());
    }

    let accounts = Arc::new(AccountRepository::new(db.clone()));
    let mirror = Arc::new(MirrorRepository::new(db.clone()));

    match cli.command {
        Command::Migrate => {}
        Command::Account { command } => match command {
            AccountCommand::Add {
                email,
                refresh_token,
            } => {
                let account = accounts
                    .register(email, refresh_token)
                    .await
                    .context("registering account")?;
                print_json(&AccountView::from(account))?;
            }
            AccountCommand::List => {
                let all = accounts.list().await.context("listing accounts")?;
                let views: Vec<AccountView> = all.into_iter().map(AccountView::from).collect();
                print_json(&views)?;
            }
        },
        command => {
            let sync = MailboxSync::from_config(&config, accounts, mirror)
                .context("building sync engine")?;
            match command {
                Command::Sync {
                    account,
                    force_full,
                } => {
                    let summary = sync
                        .sync_mailbox(account, SyncOptions { force_full })
                        .await
                        .with_context(|| format!("syncing account {}", account))?;
                    print_json(&summary)?;
                }
                Command::ApplyLabel {
                    account,
                    label,
                    message_ids,
                } => {
                    let modified = sync
                        .apply_label(account, &label, &message_ids)
                        .await
                        .with_context(|| format!("applying label {}", label))?;
                    print_json(&serde_json::json!({ "modified": modified }))?;
                }
                Command::Stats { account } => {
                    let usage = sync
                        .usage_stats(account)
                        .await
                        .context("reading label usage")?;
                    print_json(&usage)?;
                }
                Command::Messages {
                    account,
                    label,
                    limit,
                } => {
                    let messages = sync
                        .list_messages(account, limit, label.as_deref())
                        .await
                        .context("listing messages")?;
                    print_json(&messages)?;
                }
                Command::Labels { account } => {
                    let labels = sync
                        .list_labels(account)
                        .await
                        .context("listing labels")?;
                    print_json(&labels)?;
                }
                Command::Migrate | Command::Account { .. } => {}
            }
        }
    }

    Ok(())
}

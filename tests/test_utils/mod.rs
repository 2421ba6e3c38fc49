//! Test utilities for database and sync testing.
//!
//! Provides in-memory SQLite databases with migrations applied, account
//! fixtures, and a sync engine wired against a mock Gmail server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use mailmirror::MailboxSync;
use mailmirror::config::SyncConfig;
use mailmirror::gmail::GmailClient;
use mailmirror::models::account;
use mailmirror::repositories::{AccountRepository, MirrorRepository};
use mailmirror::token_manager::TokenManager;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

pub const ACCESS_TOKEN: &str = "fresh-access-token";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // Fixtures insert rows without going through the accounts table.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// Sync parameters with no rate-limit pause.
pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        rate_limit_delay_ms: 0,
        ..SyncConfig::default()
    }
}

/// Inserts an account whose access token is valid for another hour.
pub async fn insert_account(
    accounts: &AccountRepository,
    sync_cursor: Option<&str>,
) -> Result<account::Model> {
    let mut model =
        account::Model::with_refresh_token(Some("me@example.com".into()), "refresh-1".into());
    model.access_token = Some(ACCESS_TOKEN.to_string());
    model.token_expiry = Some((Utc::now() + chrono::Duration::hours(1)).into());
    model.sync_cursor = sync_cursor.map(str::to_string);
    accounts.insert(&model).await?;
    Ok(model)
}

pub fn token_manager(token_url: &str, accounts: Arc<AccountRepository>) -> TokenManager {
    TokenManager::new(
        reqwest::Client::new(),
        token_url,
        "client-id",
        "client-secret",
        Duration::from_secs(60),
        accounts,
    )
}

/// Everything a sync test needs, pointed at `server_uri`.
pub struct SyncHarness {
    pub db: Arc<DatabaseConnection>,
    pub accounts: Arc<AccountRepository>,
    pub mirror: Arc<MirrorRepository>,
    pub sync: MailboxSync,
}

pub async fn sync_harness(server_uri: &str, config: SyncConfig) -> Result<SyncHarness> {
    let db = setup_test_db_arc().await?;
    let accounts = Arc::new(AccountRepository::new(db.clone()));
    let mirror = Arc::new(MirrorRepository::new(db.clone()));

    let tokens = token_manager(&format!("{}/token", server_uri), accounts.clone());
    let client = GmailClient::new(reqwest::Client::new(), server_uri, tokens);
    let sync = MailboxSync::new(client, accounts.clone(), mirror.clone(), config);

    Ok(SyncHarness {
        db,
        accounts,
        mirror,
        sync,
    })
}

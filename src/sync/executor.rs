//! Mailbox sync orchestration.
//!
//! A pass runs either a full sync (profile, labels, listed messages) or a delta
//! sync driven by the change log from the stored cursor. A delta whose cursor
//! the provider no longer knows (HTTP 404) restarts as a full sync unless the
//! caller forced full mode already.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{AppConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::gmail::{GmailClient, HISTORY_TYPES, METADATA_HEADERS, MessageFormat};
use crate::models::account;
use crate::normalization::{build_label_update, build_message_update};
use crate::store::{AccountStore, LabelUpdate, MirrorStore};
use crate::sync::classifier::{classify_page, newer_position};
use crate::sync::lock::AccountLocks;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Run a full sync even when a cursor is stored.
    pub force_full: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Delta,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Delta => "delta",
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub upserted_count: u64,
    pub deleted_count: u64,
    /// Mode that produced the counts.
    pub mode: SyncMode,
    /// True when a delta pass was abandoned for a full sync.
    pub fell_back: bool,
}

impl SyncSummary {
    fn empty(mode: SyncMode) -> Self {
        Self {
            upserted_count: 0,
            deleted_count: 0,
            mode,
            fell_back: false,
        }
    }
}

/// Drives sync passes for any number of accounts; at most one pass per account
/// runs at a time.
pub struct MailboxSync {
    pub(crate) client: GmailClient,
    pub(crate) accounts: Arc<dyn AccountStore>,
    pub(crate) mirror: Arc<dyn MirrorStore>,
    config: SyncConfig,
    locks: AccountLocks,
}

impl MailboxSync {
    pub fn new(
        client: GmailClient,
        accounts: Arc<dyn AccountStore>,
        mirror: Arc<dyn MirrorStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            accounts,
            mirror,
            config,
            locks: AccountLocks::new(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        accounts: Arc<dyn AccountStore>,
        mirror: Arc<dyn MirrorStore>,
    ) -> SyncResult<Self> {
        let client = GmailClient::from_config(config, accounts.clone())?;
        Ok(Self::new(client, accounts, mirror, config.sync.clone()))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one pass for `account_id`.
    ///
    /// Fails with [`SyncError::SyncInProgress`] while another pass holds the
    /// account. Progress made before a failure is kept.
    #[instrument(skip_all, fields(account_id = %account_id, force_full = options.force_full))]
    pub async fn sync_mailbox(
        &self,
        account_id: Uuid,
        options: SyncOptions,
    ) -> SyncResult<SyncSummary> {
        let _guard = self
            .locks
            .try_acquire(account_id)
            .ok_or(SyncError::SyncInProgress(account_id))?;

        let started = Instant::now();
        let result = self.run_pass(account_id, options).await;
        histogram!("mail_sync_duration_ms").record(started.elapsed().as_millis() as f64);

        match &result {
            Ok(summary) => {
                counter!("mail_sync_passes_total", "mode" => summary.mode.as_str()).increment(1);
                counter!("mail_sync_messages_upserted_total").increment(summary.upserted_count);
                counter!("mail_sync_messages_deleted_total").increment(summary.deleted_count);
                info!(
                    mode = summary.mode.as_str(),
                    upserted = summary.upserted_count,
                    deleted = summary.deleted_count,
                    fell_back = summary.fell_back,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "mailbox sync completed"
                );
            }
            Err(err) => {
                counter!("mail_sync_failures_total", "kind" => err.kind()).increment(1);
                warn!(error = %err, "mailbox sync failed");
            }
        }

        result
    }

    async fn run_pass(&self, account_id: Uuid, options: SyncOptions) -> SyncResult<SyncSummary> {
        let mut account = self
            .accounts
            .load(account_id)
            .await?
            .ok_or(SyncError::AccountNotFound(account_id))?;

        let cursor = account.sync_cursor.clone().filter(|c| !c.is_empty());
        let Some(cursor) = cursor.filter(|_| !options.force_full) else {
            return self.full_sync(&mut account).await;
        };

        match self.delta_sync(&mut account, &cursor).await {
            Err(err) if err.is_not_found() => {
                warn!(
                    cursor = %cursor,
                    error = %err,
                    "change log rejected stored cursor, falling back to full sync"
                );
                counter!("mail_sync_fallback_total").increment(1);
                let mut summary = self.full_sync(&mut account).await?;
                summary.fell_back = true;
                Ok(summary)
            }
            other => other,
        }
    }

    async fn pause(&self) {
        if self.config.rate_limit_delay_ms > 0 {
            sleep(Duration::from_millis(self.config.rate_limit_delay_ms)).await;
        }
    }

    /// Mirrors labels and up to `max_full_sync_messages` listed messages, then
    /// stores the profile position as the new cursor.
    #[instrument(skip_all, fields(mode = "full"))]
    async fn full_sync(&self, account: &mut account::Model) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::empty(SyncMode::Full);

        // Read the position first so changes made during the pass are replayed by the next delta.
        let profile = self.client.profile(account).await?;
        if profile.email_address.is_some() {
            account.email_address = profile.email_address.clone();
        }

        let labels = self.client.list_labels(account).await?;
        let label_updates: Vec<LabelUpdate> = labels.iter().map(build_label_update).collect();
        self.mirror.upsert_labels(account.id, &label_updates).await?;
        debug!(labels = label_updates.len(), "labels mirrored");

        let max_messages = self.config.max_full_sync_messages;
        let mut fetched = 0usize;
        let mut page_token: Option<String> = None;

        'pages: loop {
            let remaining = max_messages.saturating_sub(fetched);
            let page_size = remaining.min(self.config.page_size as usize) as u32;
            let page = self
                .client
                .list_messages(
                    account,
                    &self.config.full_sync_label_ids,
                    page_size,
                    page_token.as_deref(),
                )
                .await?;

            for message_ref in &page.messages {
                if fetched >= max_messages {
                    break 'pages;
                }
                self.pause().await;
                let message = self
                    .client
                    .get_message(account, &message_ref.id, MessageFormat::Full, &[])
                    .await?;
                self.mirror
                    .upsert_message(account.id, &build_message_update(&message, true))
                    .await?;
                fetched += 1;
                summary.upserted_count += 1;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() && fetched < max_messages => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }

        account.sync_cursor = Some(profile.history_id.clone());
        account.last_full_sync_at = Some(Utc::now().into());
        self.accounts.persist_sync_state(account).await?;

        Ok(summary)
    }

    /// Replays the change log from `start_position`, committing the cursor
    /// after each page whose fetches all succeeded.
    #[instrument(skip_all, fields(mode = "delta", start_position = %start_position))]
    async fn delta_sync(
        &self,
        account: &mut account::Model,
        start_position: &str,
    ) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::empty(SyncMode::Delta);
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_history(account, start_position, page_token.as_deref(), HISTORY_TYPES)
                .await?;
            let changes = classify_page(&page.history);
            debug!(
                records = page.history.len(),
                full_fetch = changes.full_fetch.len(),
                metadata_only = changes.metadata_only.len(),
                delete = changes.delete.len(),
                "history page classified"
            );

            if !changes.delete.is_empty() {
                summary.deleted_count += self
                    .mirror
                    .delete_messages(account.id, &changes.delete)
                    .await?;
            }

            for id in &changes.full_fetch {
                self.pause().await;
                let message = self
                    .client
                    .get_message(account, id, MessageFormat::Full, &[])
                    .await?;
                self.mirror
                    .upsert_message(account.id, &build_message_update(&message, true))
                    .await?;
                summary.upserted_count += 1;
            }

            for id in &changes.metadata_only {
                self.pause().await;
                let message = self
                    .client
                    .get_message(account, id, MessageFormat::Metadata, METADATA_HEADERS)
                    .await?;
                self.mirror
                    .upsert_message(account.id, &build_message_update(&message, false))
                    .await?;
                summary.upserted_count += 1;
            }

            if let Some(position) = changes.latest_position.as_deref() {
                let next = newer_position(account.sync_cursor.as_deref(), position).to_string();
                if account.sync_cursor.as_deref() != Some(next.as_str()) {
                    account.sync_cursor = Some(next);
                    self.accounts.persist_sync_state(account).await?;
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(summary)
    }
}

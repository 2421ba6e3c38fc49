//! # Store Abstractions
//!
//! Traits the sync engine uses to reach local persistence. The SeaORM-backed
//! implementations live in [`crate::repositories`]; tests and alternative
//! backends can provide their own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{account, mail_label, mail_message};

pub type StoreResult<T> = Result<T, StoreError>;

/// Field update with three states: `None` leaves the stored value untouched,
/// `Some(None)` clears it, `Some(Some(v))` overwrites it.
pub type Patch<T> = Option<Option<T>>;

/// Partial message document produced from one remote fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageUpdate {
    pub remote_message_id: String,
    pub thread_id: Patch<String>,
    pub history_marker: Patch<String>,
    /// Always written; a message without labels stores an empty set.
    pub label_ids: Vec<String>,
    pub subject: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub snippet: Patch<String>,
    pub sent_at: Patch<DateTime<Utc>>,
    pub size_estimate: Patch<i64>,
    pub plain_body: Option<String>,
    pub html_body: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

/// Label document produced from the remote label listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelUpdate {
    pub remote_label_id: String,
    pub name: String,
    pub kind: Patch<String>,
    pub message_list_visibility: Patch<String>,
    pub label_list_visibility: Patch<String>,
    pub text_color: Patch<String>,
    pub background_color: Patch<String>,
    pub total_count: Patch<i64>,
    pub unread_count: Patch<i64>,
}

/// Per-label counts over the local mirror.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LabelUsage {
    pub label_id: String,
    pub total: u64,
    pub unread: u64,
}

/// Credential and cursor persistence for accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load(&self, account_id: Uuid) -> StoreResult<Option<account::Model>>;

    /// Writes only the credential columns: access token, refresh token, expiry.
    async fn persist_tokens(&self, account: &account::Model) -> StoreResult<()>;

    /// Writes only the sync state columns: cursor, last full sync, email address.
    async fn persist_sync_state(&self, account: &account::Model) -> StoreResult<()>;
}

/// Keyed persistence for mirrored messages and labels.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Merge `update` into the message keyed by `(account_id, remote_message_id)`,
    /// creating it when missing.
    async fn upsert_message(&self, account_id: Uuid, update: &MessageUpdate) -> StoreResult<()>;

    async fn upsert_labels(&self, account_id: Uuid, labels: &[LabelUpdate]) -> StoreResult<()>;

    async fn find_message(
        &self,
        account_id: Uuid,
        remote_message_id: &str,
    ) -> StoreResult<Option<mail_message::Model>>;

    /// Returns the number of rows removed.
    async fn delete_messages(&self, account_id: Uuid, remote_ids: &[String]) -> StoreResult<u64>;

    async fn count_messages(&self, account_id: Uuid) -> StoreResult<u64>;

    /// Adds `label_id` to each listed message lacking it; returns how many changed.
    async fn add_label(
        &self,
        account_id: Uuid,
        label_id: &str,
        remote_ids: &[String],
    ) -> StoreResult<u64>;

    async fn label_usage(&self, account_id: Uuid) -> StoreResult<Vec<LabelUsage>>;

    /// Newest first, optionally restricted to one label.
    async fn list_messages(
        &self,
        account_id: Uuid,
        limit: u64,
        label_id: Option<&str>,
    ) -> StoreResult<Vec<mail_message::Model>>;

    /// Ordered by name.
    async fn list_labels(&self, account_id: Uuid) -> StoreResult<Vec<mail_label::Model>>;
}

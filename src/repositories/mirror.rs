//! Mirror repository for database operations
//!
//! Keyed upserts, deletes and read queries over `mail_messages` and
//! `mail_labels`. Every query is scoped to one account.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::models::mail_label::{self, Entity as MailLabel};
use crate::models::mail_message::{self, Entity as MailMessage};
use crate::store::{LabelUpdate, LabelUsage, MessageUpdate, MirrorStore, StoreResult};

const UNREAD_LABEL: &str = "UNREAD";

/// Repository for mirrored messages and labels
#[derive(Debug, Clone)]
pub struct MirrorRepository {
    pub db: Arc<DatabaseConnection>,
}

impl MirrorRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_message_in<C: ConnectionTrait>(
        conn: &C,
        account_id: Uuid,
        remote_message_id: &str,
    ) -> StoreResult<Option<mail_message::Model>> {
        Ok(MailMessage::find()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .filter(mail_message::Column::RemoteMessageId.eq(remote_message_id))
            .one(conn)
            .await?)
    }

    async fn upsert_label_in<C: ConnectionTrait>(
        conn: &C,
        account_id: Uuid,
        label: &LabelUpdate,
        now: DateTimeWithTimeZone,
    ) -> StoreResult<()> {
        let existing = MailLabel::find()
            .filter(mail_label::Column::AccountId.eq(account_id))
            .filter(mail_label::Column::RemoteLabelId.eq(label.remote_label_id.as_str()))
            .one(conn)
            .await?;

        let is_new = existing.is_none();
        let mut am = match existing {
            Some(row) => row.into(),
            None => mail_label::ActiveModel {
                id: Set(Uuid::new_v4()),
                account_id: Set(account_id),
                remote_label_id: Set(label.remote_label_id.clone()),
                ..Default::default()
            },
        };

        am.name = Set(label.name.clone());
        am.last_synced_at = Set(now);
        if let Some(kind) = &label.kind {
            am.kind = Set(kind.clone());
        }
        if let Some(visibility) = &label.message_list_visibility {
            am.message_list_visibility = Set(visibility.clone());
        }
        if let Some(visibility) = &label.label_list_visibility {
            am.label_list_visibility = Set(visibility.clone());
        }
        if let Some(color) = &label.text_color {
            am.text_color = Set(color.clone());
        }
        if let Some(color) = &label.background_color {
            am.background_color = Set(color.clone());
        }
        if let Some(total) = label.total_count {
            am.total_count = Set(total);
        }
        if let Some(unread) = label.unread_count {
            am.unread_count = Set(unread);
        }

        if is_new {
            am.insert(conn).await?;
        } else {
            am.update(conn).await?;
        }
        Ok(())
    }
}

/// Copies every present field of `update` onto `am`; absent fields stay untouched.
fn apply_message_update(
    am: &mut mail_message::ActiveModel,
    update: &MessageUpdate,
) -> StoreResult<()> {
    am.label_ids = Set(Some(serde_json::to_value(&update.label_ids)?));

    if let Some(thread_id) = &update.thread_id {
        am.thread_id = Set(thread_id.clone());
    }
    if let Some(marker) = &update.history_marker {
        am.history_marker = Set(marker.clone());
    }
    if let Some(subject) = &update.subject {
        am.subject = Set(Some(subject.clone()));
    }
    if let Some(from) = &update.from_address {
        am.from_address = Set(Some(from.clone()));
    }
    if let Some(to) = &update.to_address {
        am.to_address = Set(Some(to.clone()));
    }
    if let Some(snippet) = &update.snippet {
        am.snippet = Set(snippet.clone());
    }
    if let Some(sent_at) = update.sent_at {
        am.sent_at = Set(sent_at.map(Into::into));
    }
    if let Some(size) = update.size_estimate {
        am.size_estimate = Set(size);
    }
    if let Some(plain) = &update.plain_body {
        am.plain_body = Set(Some(plain.clone()));
    }
    if let Some(html) = &update.html_body {
        am.html_body = Set(Some(html.clone()));
    }
    if let Some(headers) = &update.headers {
        am.headers = Set(Some(serde_json::to_value(headers)?));
    }

    Ok(())
}

#[async_trait]
impl MirrorStore for MirrorRepository {
    async fn upsert_message(&self, account_id: Uuid, update: &MessageUpdate) -> StoreResult<()> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        match Self::find_message_in(&*self.db, account_id, &update.remote_message_id).await? {
            Some(existing) => {
                let mut am: mail_message::ActiveModel = existing.into();
                apply_message_update(&mut am, update)?;
                am.last_synced_at = Set(now);
                am.update(&*self.db).await?;
            }
            None => {
                let mut am = mail_message::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    account_id: Set(account_id),
                    remote_message_id: Set(update.remote_message_id.clone()),
                    last_synced_at: Set(now),
                    created_at: Set(now),
                    ..Default::default()
                };
                apply_message_update(&mut am, update)?;
                am.insert(&*self.db).await?;
            }
        }

        Ok(())
    }

    async fn upsert_labels(&self, account_id: Uuid, labels: &[LabelUpdate]) -> StoreResult<()> {
        if labels.is_empty() {
            return Ok(());
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = self.db.begin().await?;
        for label in labels {
            Self::upsert_label_in(&txn, account_id, label, now).await?;
        }
        txn.commit().await?;

        Ok(())
    }

    async fn find_message(
        &self,
        account_id: Uuid,
        remote_message_id: &str,
    ) -> StoreResult<Option<mail_message::Model>> {
        Self::find_message_in(&*self.db, account_id, remote_message_id).await
    }

    async fn delete_messages(&self, account_id: Uuid, remote_ids: &[String]) -> StoreResult<u64> {
        if remote_ids.is_empty() {
            return Ok(0);
        }

        let result = MailMessage::delete_many()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .filter(mail_message::Column::RemoteMessageId.is_in(remote_ids.iter().cloned()))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn count_messages(&self, account_id: Uuid) -> StoreResult<u64> {
        Ok(MailMessage::find()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .count(&*self.db)
            .await?)
    }

    async fn add_label(
        &self,
        account_id: Uuid,
        label_id: &str,
        remote_ids: &[String],
    ) -> StoreResult<u64> {
        if remote_ids.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await?;
        let rows = MailMessage::find()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .filter(mail_message::Column::RemoteMessageId.is_in(remote_ids.iter().cloned()))
            .all(&txn)
            .await?;

        let mut modified = 0;
        for row in rows {
            let mut labels = row.label_set();
            if labels.iter().any(|label| label == label_id) {
                continue;
            }
            labels.push(label_id.to_string());

            let mut am: mail_message::ActiveModel = row.into();
            am.label_ids = Set(Some(serde_json::to_value(&labels)?));
            am.update(&txn).await?;
            modified += 1;
        }
        txn.commit().await?;

        Ok(modified)
    }

    async fn label_usage(&self, account_id: Uuid) -> StoreResult<Vec<LabelUsage>> {
        let rows = MailMessage::find()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .all(&*self.db)
            .await?;

        let mut usage: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for row in &rows {
            let labels = row.label_set();
            let unread = labels.iter().any(|label| label == UNREAD_LABEL);
            for label in labels {
                let entry = usage.entry(label).or_default();
                entry.0 += 1;
                if unread {
                    entry.1 += 1;
                }
            }
        }

        Ok(usage
            .into_iter()
            .map(|(label_id, (total, unread))| LabelUsage {
                label_id,
                total,
                unread,
            })
            .collect())
    }

    async fn list_messages(
        &self,
        account_id: Uuid,
        limit: u64,
        label_id: Option<&str>,
    ) -> StoreResult<Vec<mail_message::Model>> {
        let query = MailMessage::find()
            .filter(mail_message::Column::AccountId.eq(account_id))
            .order_by_desc(mail_message::Column::SentAt)
            .order_by_desc(mail_message::Column::CreatedAt);

        // Label sets are JSON, so the label filter runs after loading.
        match label_id {
            None => Ok(query.limit(limit).all(&*self.db).await?),
            Some(label_id) => Ok(query
                .all(&*self.db)
                .await?
                .into_iter()
                .filter(|message| message.has_label(label_id))
                .take(limit as usize)
                .collect()),
        }
    }

    async fn list_labels(&self, account_id: Uuid) -> StoreResult<Vec<mail_label::Model>> {
        Ok(MailLabel::find()
            .filter(mail_label::Column::AccountId.eq(account_id))
            .order_by_asc(mail_label::Column::Name)
            .all(&*self.db)
            .await?)
    }
}

//! Label application and read queries over the local mirror.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::gmail::types::BatchModifyRequest;
use crate::models::{account, mail_label, mail_message};
use crate::store::LabelUsage;
use crate::sync::executor::MailboxSync;

impl MailboxSync {
    async fn load_account(&self, account_id: Uuid) -> SyncResult<account::Model> {
        self.accounts
            .load(account_id)
            .await?
            .ok_or(SyncError::AccountNotFound(account_id))
    }

    /// Adds `label_id` remotely through a batch modify, then to the mirrored copies.
    ///
    /// Returns how many local messages changed; messages already carrying the
    /// label are not counted. An empty id list does nothing.
    #[instrument(skip_all, fields(account_id = %account_id, label_id = %label_id, messages = message_ids.len()))]
    pub async fn apply_label(
        &self,
        account_id: Uuid,
        label_id: &str,
        message_ids: &[String],
    ) -> SyncResult<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let mut account = self.load_account(account_id).await?;
        let request = BatchModifyRequest {
            ids: message_ids.to_vec(),
            add_label_ids: vec![label_id.to_string()],
            remove_label_ids: Vec::new(),
        };
        self.client.batch_modify(&mut account, &request).await?;

        let modified = self
            .mirror
            .add_label(account_id, label_id, message_ids)
            .await?;
        info!(modified, "label applied");

        Ok(modified)
    }

    /// Per label: how many mirrored messages carry it, and how many of those are unread.
    pub async fn usage_stats(&self, account_id: Uuid) -> SyncResult<Vec<LabelUsage>> {
        self.load_account(account_id).await?;
        Ok(self.mirror.label_usage(account_id).await?)
    }

    pub async fn list_messages(
        &self,
        account_id: Uuid,
        limit: u64,
        label_id: Option<&str>,
    ) -> SyncResult<Vec<mail_message::Model>> {
        self.load_account(account_id).await?;
        Ok(self
            .mirror
            .list_messages(account_id, limit, label_id)
            .await?)
    }

    pub async fn list_labels(&self, account_id: Uuid) -> SyncResult<Vec<mail_label::Model>> {
        self.load_account(account_id).await?;
        Ok(self.mirror.list_labels(account_id).await?)
    }
}

//! Account repository for database operations
//!
//! Stores per-account OAuth credentials and sync cursor state. Credentials and
//! sync state are written by separate updates so a caller holding an older
//! copy of the row cannot overwrite the other half.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::models::account::{self, Entity as Account};
use crate::store::{AccountStore, StoreResult};

/// Repository for account database operations
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pub db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Registers a new account holding only a refresh token.
    pub async fn register(
        &self,
        email_address: Option<String>,
        refresh_token: String,
    ) -> StoreResult<account::Model> {
        let model = account::Model::with_refresh_token(email_address, refresh_token);
        self.insert(&model).await
    }

    /// Inserts `account` as a new row, every column included.
    pub async fn insert(&self, account: &account::Model) -> StoreResult<account::Model> {
        let am = account::ActiveModel {
            id: Set(account.id),
            email_address: Set(account.email_address.clone()),
            access_token: Set(account.access_token.clone()),
            refresh_token: Set(account.refresh_token.clone()),
            token_expiry: Set(account.token_expiry),
            sync_cursor: Set(account.sync_cursor.clone()),
            last_full_sync_at: Set(account.last_full_sync_at),
            created_at: Set(account.created_at),
            updated_at: Set(Utc::now().into()),
        };
        Ok(am.insert(&*self.db).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<account::Model>> {
        Ok(Account::find_by_id(id).one(&*self.db).await?)
    }

    /// Lists all accounts ordered by creation time
    pub async fn list(&self) -> StoreResult<Vec<account::Model>> {
        Ok(Account::find()
            .order_by_asc(account::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Active model touching no column besides the key and `updated_at`.
    fn partial(id: Uuid) -> account::ActiveModel {
        account::ActiveModel {
            id: ActiveValue::Unchanged(id),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn load(&self, account_id: Uuid) -> StoreResult<Option<account::Model>> {
        self.find_by_id(account_id).await
    }

    async fn persist_tokens(&self, account: &account::Model) -> StoreResult<()> {
        let mut am = Self::partial(account.id);
        am.access_token = Set(account.access_token.clone());
        am.refresh_token = Set(account.refresh_token.clone());
        am.token_expiry = Set(account.token_expiry);
        am.update(&*self.db).await?;
        Ok(())
    }

    async fn persist_sync_state(&self, account: &account::Model) -> StoreResult<()> {
        let mut am = Self::partial(account.id);
        am.sync_cursor = Set(account.sync_cursor.clone());
        am.last_full_sync_at = Set(account.last_full_sync_at);
        am.email_address = Set(account.email_address.clone());
        am.update(&*self.db).await?;
        Ok(())
    }
}

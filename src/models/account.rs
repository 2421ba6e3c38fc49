//! Account entity model
//!
//! An account is the owner of one mirrored mailbox. It carries the OAuth
//! credentials used against the provider and the incremental sync state.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Mailbox address reported by the provider profile
    pub email_address: Option<String>,

    pub access_token: Option<String>,

    pub refresh_token: Option<String>,

    /// Expiry of `access_token`
    pub token_expiry: Option<DateTimeWithTimeZone>,

    /// Last committed position in the provider change log
    pub sync_cursor: Option<String>,

    pub last_full_sync_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::mail_message::Entity")]
    MailMessage,
    #[sea_orm(has_many = "super::mail_label::Entity")]
    MailLabel,
}

impl Related<super::mail_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MailMessage.def()
    }
}

impl Related<super::mail_label::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MailLabel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Build a fresh account holding only a refresh token, as produced by the
    /// external authentication flow.
    pub fn with_refresh_token(email_address: Option<String>, refresh_token: String) -> Self {
        let now: DateTimeWithTimeZone = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            email_address,
            access_token: None,
            refresh_token: Some(refresh_token),
            token_expiry: None,
            sync_cursor: None,
            last_full_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Token expiry converted to UTC.
    pub fn token_expiry_utc(&self) -> Option<DateTime<Utc>> {
        self.token_expiry.map(|expiry| expiry.with_timezone(&Utc))
    }
}

//! Mail message entity model
//!
//! One mirrored remote message, keyed by `(account_id, remote_message_id)`.
//! Label ids and the raw header map are stored as JSON.

use std::collections::BTreeMap;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mail_messages")]
pub struct Model {
    /// Surrogate primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning account
    pub account_id: Uuid,

    /// Message id assigned by the provider
    pub remote_message_id: String,

    pub thread_id: Option<String>,

    /// Change-log position at which the message was last observed
    pub history_marker: Option<String>,

    /// JSON array of label ids
    #[sea_orm(column_type = "JsonBinary")]
    pub label_ids: Option<JsonValue>,

    pub subject: Option<String>,

    pub from_address: Option<String>,

    pub to_address: Option<String>,

    pub snippet: Option<String>,

    pub sent_at: Option<DateTimeWithTimeZone>,

    pub size_estimate: Option<i64>,

    pub plain_body: Option<String>,

    pub html_body: Option<String>,

    /// JSON object of header name to value
    #[sea_orm(column_type = "JsonBinary")]
    pub headers: Option<JsonValue>,

    pub last_synced_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Label ids carried by this message; malformed JSON reads as no labels.
    pub fn label_set(&self) -> Vec<String> {
        self.label_ids
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_set().iter().any(|label| label == label_id)
    }

    /// Stored header map.
    pub fn header_map(&self) -> BTreeMap<String, String> {
        self.headers
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

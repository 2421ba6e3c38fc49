//! Gmail REST v1 wire types.
//!
//! Fields that the mirror must treat as tri-state (absent, explicit `null`,
//! value) deserialize into `Option<Option<T>>` through [`explicit_null`].
//! Change-log positions arrive as strings but numbers are tolerated.

use serde::{Deserialize, Deserializer, Serialize};

use crate::store::Patch;

/// Missing field stays `None` (via `#[serde(default)]`), `null` becomes `Some(None)`.
pub(crate) fn explicit_null<'de, D, T>(deserializer: D) -> Result<Patch<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn position<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(Into::into)
}

fn optional_position<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(Into::into))
}

fn explicit_null_position<'de, D>(deserializer: D) -> Result<Patch<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| Some(v.map(Into::into)))
}

/// `GET profile`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(deserialize_with = "position")]
    pub history_id: String,
    #[serde(default)]
    pub messages_total: Option<u64>,
    #[serde(default)]
    pub threads_total: Option<u64>,
}

/// `GET labels`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<RemoteLabel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLabel {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "explicit_null")]
    pub kind: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub message_list_visibility: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub label_list_visibility: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub color: Patch<LabelColor>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub messages_total: Patch<i64>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub messages_unread: Patch<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    #[serde(default, deserialize_with = "explicit_null")]
    pub text_color: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub background_color: Patch<String>,
}

/// `GET messages`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// `GET messages/{id}` in `full` or `metadata` format.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    #[serde(default, deserialize_with = "explicit_null")]
    pub thread_id: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null_position")]
    pub history_id: Patch<String>,
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub snippet: Patch<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub size_estimate: Patch<i64>,
    /// Epoch milliseconds as a decimal string.
    #[serde(default, deserialize_with = "explicit_null_position")]
    pub internal_date: Patch<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Option<Vec<Header>>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

/// `GET history`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default, deserialize_with = "optional_position")]
    pub history_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default, deserialize_with = "optional_position")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages_added: Vec<HistoryMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages_deleted: Vec<HistoryMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels_added: Vec<HistoryMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels_removed: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    #[serde(default)]
    pub message: Option<MessageRef>,
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,
}

impl HistoryMessage {
    pub fn message_id(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Body of `POST messages/batchModify`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyRequest {
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

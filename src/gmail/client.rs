//! Authenticated Gmail REST client.
//!
//! Every call first obtains a valid access token from the [`TokenManager`],
//! then issues the request with a bearer header. Non-success statuses map to
//! [`SyncError::RemoteApi`]; nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{SyncError, SyncResult};
use crate::gmail::types::{
    BatchModifyRequest, HistoryList, LabelList, MessageList, Profile, RemoteLabel, RemoteMessage,
};
use crate::models::account;
use crate::store::AccountStore;
use crate::token_manager::TokenManager;

/// One query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    /// Encoded as the same key repeated once per item.
    List(Vec<String>),
    /// Omitted from the URL.
    Absent,
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<&[&str]> for QueryValue {
    fn from(values: &[&str]) -> Self {
        QueryValue::List(values.iter().map(|v| v.to_string()).collect())
    }
}

impl From<&[String]> for QueryValue {
    fn from(values: &[String]) -> Self {
        QueryValue::List(values.to_vec())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::List(values)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Absent)
    }
}

/// `messages/{id}` response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Full,
    Metadata,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
        }
    }
}

/// Absolute `path`s are used as-is, anything else is joined onto `api_base`.
pub fn resolve_url(api_base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Flattens query entries into ordered key/value pairs.
pub fn encode_query(query: &[(&str, QueryValue)]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        match value {
            QueryValue::Scalar(v) => pairs.push((key.to_string(), v.clone())),
            QueryValue::List(items) => {
                pairs.extend(items.iter().map(|item| (key.to_string(), item.clone())))
            }
            QueryValue::Absent => {}
        }
    }
    pairs
}

pub struct GmailClient {
    http_client: Client,
    api_base: String,
    tokens: TokenManager,
}

impl GmailClient {
    pub fn new(http_client: Client, api_base: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            http_client,
            api_base: api_base.into(),
            tokens,
        }
    }

    /// Builds the client and its token manager from configuration.
    pub fn from_config(config: &AppConfig, accounts: Arc<dyn AccountStore>) -> SyncResult<Self> {
        let http_client = Self::build_http_client(Duration::from_secs(config.http_timeout_seconds))?;
        let tokens = TokenManager::from_config(config, http_client.clone(), accounts);
        Ok(Self::new(http_client, config.gmail_api_base.clone(), tokens))
    }

    pub fn build_http_client(timeout: Duration) -> SyncResult<Client> {
        Ok(Client::builder().timeout(timeout).build()?)
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Issues one authenticated request and returns the parsed JSON body.
    ///
    /// An empty success body yields `JsonValue::Null`.
    pub async fn request(
        &self,
        account: &mut account::Model,
        method: Method,
        path: &str,
        query: &[(&str, QueryValue)],
        body: Option<&JsonValue>,
    ) -> SyncResult<JsonValue> {
        let token = self.tokens.ensure_access_token(account).await?;
        let url = resolve_url(&self.api_base, path);

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", token))
            .query(&encode_query(query));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(
            account_id = %account.id,
            method = %method,
            path,
            status = status.as_u16(),
            "gmail request"
        );

        let text = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::RemoteApi {
                status: status.as_u16(),
                message: format!("Gmail API error {}: {}", status.as_u16(), text),
            });
        }

        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_as<T: DeserializeOwned>(
        &self,
        account: &mut account::Model,
        path: &str,
        query: &[(&str, QueryValue)],
    ) -> SyncResult<T> {
        let value = self
            .request(account, Method::GET, path, query, None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn profile(&self, account: &mut account::Model) -> SyncResult<Profile> {
        self.get_as(account, "profile", &[]).await
    }

    pub async fn list_labels(&self, account: &mut account::Model) -> SyncResult<Vec<RemoteLabel>> {
        let list: LabelList = self.get_as(account, "labels", &[]).await?;
        Ok(list.labels)
    }

    pub async fn list_messages(
        &self,
        account: &mut account::Model,
        label_ids: &[String],
        page_size: u32,
        page_token: Option<&str>,
    ) -> SyncResult<MessageList> {
        self.get_as(
            account,
            "messages",
            &[
                ("labelIds", label_ids.into()),
                ("maxResults", page_size.into()),
                ("pageToken", page_token.into()),
            ],
        )
        .await
    }

    pub async fn get_message(
        &self,
        account: &mut account::Model,
        message_id: &str,
        format: MessageFormat,
        metadata_headers: &[&str],
    ) -> SyncResult<RemoteMessage> {
        let headers: QueryValue = match format {
            MessageFormat::Metadata => metadata_headers.into(),
            MessageFormat::Full => QueryValue::Absent,
        };
        self.get_as(
            account,
            &format!("messages/{}", message_id),
            &[("format", format.as_str().into()), ("metadataHeaders", headers)],
        )
        .await
    }

    pub async fn list_history(
        &self,
        account: &mut account::Model,
        start_history_id: &str,
        page_token: Option<&str>,
        history_types: &[&str],
    ) -> SyncResult<HistoryList> {
        self.get_as(
            account,
            "history",
            &[
                ("startHistoryId", start_history_id.into()),
                ("pageToken", page_token.into()),
                ("historyTypes", history_types.into()),
            ],
        )
        .await
    }

    pub async fn batch_modify(
        &self,
        account: &mut account::Model,
        request: &BatchModifyRequest,
    ) -> SyncResult<()> {
        let body = serde_json::to_value(request)?;
        self.request(
            account,
            Method::POST,
            "messages/batchModify",
            &[],
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

//! Access token lifecycle.
//!
//! Hands out a usable access token for an account, running the OAuth
//! refresh-token grant when the stored token is missing, expired, or about to
//! expire. Refreshed credentials are persisted through the [`AccountStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use metrics::counter;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{SyncError, SyncResult};
use crate::gmail::types::TokenResponse;
use crate::models::account;
use crate::store::AccountStore;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// `now + expires_in`, using the default lifetime when that is out of range.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| now + TimeDelta::seconds(DEFAULT_EXPIRES_IN_SECONDS))
}

pub struct TokenManager {
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    expiry_margin: chrono::Duration,
    accounts: Arc<dyn AccountStore>,
}

impl TokenManager {
    pub fn new(
        http_client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        expiry_margin: Duration,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            expiry_margin: chrono::Duration::from_std(expiry_margin)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            accounts,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        http_client: Client,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self::new(
            http_client,
            config.google_token_url.clone(),
            config.google_client_id.clone().unwrap_or_default(),
            config.google_client_secret.clone().unwrap_or_default(),
            Duration::from_secs(config.sync.token_expiry_margin_seconds),
            accounts,
        )
    }

    /// Returns an access token valid for at least the configured margin.
    ///
    /// On refresh the account is updated in place and persisted. No retry.
    pub async fn ensure_access_token(&self, account: &mut account::Model) -> SyncResult<String> {
        if let (Some(token), Some(expiry)) = (&account.access_token, account.token_expiry_utc())
            && expiry - Utc::now() > self.expiry_margin
        {
            return Ok(token.clone());
        }

        let Some(refresh_token) = account.refresh_token.clone() else {
            warn!(account_id = %account.id, "account has no refresh token");
            return Err(SyncError::MissingCredential {
                account_id: account.id,
            });
        };

        debug!(account_id = %account.id, "refreshing access token");
        let refreshed = match self.refresh(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                counter!("token_refresh_total", "outcome" => "failure").increment(1);
                warn!(account_id = %account.id, error = %err, "access token refresh failed");
                return Err(err);
            }
        };

        let expires_in = refreshed
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        account.access_token = Some(refreshed.access_token.clone());
        account.token_expiry = Some(expiry_after(Utc::now(), expires_in).into());
        if let Some(rotated) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
            account.refresh_token = Some(rotated);
        }

        self.accounts.persist_tokens(account).await?;

        counter!("token_refresh_total", "outcome" => "success").increment(1);
        info!(account_id = %account.id, expires_in, "access token refreshed");

        Ok(refreshed.access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> SyncResult<TokenResponse> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::TokenRefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

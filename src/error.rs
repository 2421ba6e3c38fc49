//! # Error Handling
//!
//! Error taxonomy for mailbox synchronization. Every fallible operation of the
//! sync engine returns [`SyncError`]; persistence failures are wrapped as
//! [`StoreError`] so callers can tell a broken store apart from a remote fault.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("failed to encode stored value: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors surfaced by a synchronization pass and the operations around it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The account has no refresh token, so no access token can be obtained.
    #[error("account {account_id} has no refresh token")]
    MissingCredential { account_id: Uuid },

    /// The token endpoint rejected the refresh-token grant.
    #[error("token refresh failed with status {status}: {body}")]
    TokenRefreshFailed { status: u16, body: String },

    /// The mail API answered with a non-success status.
    #[error("remote API error {status}: {message}")]
    RemoteApi { status: u16, message: String },

    #[error("account {0} not found")]
    AccountNotFound(Uuid),

    /// Another pass for the same account is still running.
    #[error("a sync pass is already running for account {0}")]
    SyncInProgress(Uuid),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// True for a 404 from the mail API, which means the stored cursor is no
    /// longer known to the provider.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::RemoteApi { status: 404, .. })
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::MissingCredential { .. } => "missing_credential",
            SyncError::TokenRefreshFailed { .. } => "token_refresh_failed",
            SyncError::RemoteApi { .. } => "remote_api",
            SyncError::AccountNotFound(_) => "account_not_found",
            SyncError::SyncInProgress(_) => "sync_in_progress",
            SyncError::Transport(_) => "transport",
            SyncError::Decode(_) => "decode",
            SyncError::Store(_) => "store",
        }
    }
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        SyncError::Store(StoreError::Database(err))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

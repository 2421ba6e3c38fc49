//! Configuration loading for the mail mirror.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `MAILMIRROR_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ENV_PREFIX: &str = "MAILMIRROR_";

/// Application configuration derived from `MAILMIRROR_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,
    #[serde(default = "default_gmail_api_base")]
    pub gmail_api_base: String,
    #[serde(default = "default_google_token_url")]
    pub google_token_url: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Parameters of a synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Pause before each single-message fetch in milliseconds (default: 200)
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Upper bound on messages fetched by one full sync (default: 2000)
    #[serde(default = "default_max_full_sync_messages")]
    pub max_full_sync_messages: usize,

    /// Page size for message listing, 1..=500 (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Label filter applied to the full-sync message listing (default: INBOX)
    #[serde(default = "default_full_sync_label_ids")]
    pub full_sync_label_ids: Vec<String>,

    /// Access tokens expiring within this margin are refreshed (default: 60)
    #[serde(default = "default_token_expiry_margin_seconds")]
    pub token_expiry_margin_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_full_sync_messages: default_max_full_sync_messages(),
            page_size: default_page_size(),
            full_sync_label_ids: default_full_sync_label_ids(),
            token_expiry_margin_seconds: default_token_expiry_margin_seconds(),
        }
    }
}

impl SyncConfig {
    /// Validate sync parameter bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 500 {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }

        if self.max_full_sync_messages == 0 {
            return Err(ConfigError::InvalidMaxFullSyncMessages {
                value: self.max_full_sync_messages,
            });
        }

        // Google rejects tokens once expired; a margin above an hour would refresh on every call.
        if self.token_expiry_margin_seconds > 3600 {
            return Err(ConfigError::InvalidTokenExpiryMargin {
                value: self.token_expiry_margin_seconds,
            });
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            google_client_id: None,
            google_client_secret: None,
            gmail_api_base: default_gmail_api_base(),
            google_token_url: default_google_token_url(),
            http_timeout_seconds: default_http_timeout_seconds(),
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.google_client_id.is_some() {
            config.google_client_id = Some("[REDACTED]".to_string());
        }
        if config.google_client_secret.is_some() {
            config.google_client_secret = Some("[REDACTED]".to_string());
        }
        if let Ok(mut url) = Url::parse(&config.database_url)
            && url.password().is_some()
            && url.set_password(Some("[REDACTED]")).is_ok()
        {
            config.database_url = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections {
                value: self.db_max_connections,
            });
        }

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_seconds,
            });
        }

        for (field, value) in [
            ("GMAIL_API_BASE", &self.gmail_api_base),
            ("GOOGLE_TOKEN_URL", &self.google_token_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                field,
                value: value.clone(),
                source,
            })?;
        }

        // Google credentials are only optional for local development and tests.
        if !matches!(self.profile.as_str(), "local" | "test") {
            if self.google_client_id.is_none() {
                return Err(ConfigError::MissingGoogleClientId);
            }
            if self.google_client_secret.is_none() {
                return Err(ConfigError::MissingGoogleClientSecret);
            }
        }

        self.sync.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://mailmirror.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com/gmail/v1/users/me".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_rate_limit_delay_ms() -> u64 {
    200
}

fn default_max_full_sync_messages() -> usize {
    2000
}

fn default_page_size() -> u32 {
    100
}

fn default_full_sync_label_ids() -> Vec<String> {
    vec!["INBOX".to_string()]
}

fn default_token_expiry_margin_seconds() -> u64 {
    60
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("database max connections must be positive, got {value}")]
    InvalidDbMaxConnections { value: u32 },
    #[error("http timeout must be positive, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("invalid URL for {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("Google client ID is missing; set MAILMIRROR_GOOGLE_CLIENT_ID environment variable")]
    MissingGoogleClientId,
    #[error(
        "Google client secret is missing; set MAILMIRROR_GOOGLE_CLIENT_SECRET environment variable"
    )]
    MissingGoogleClientSecret,
    #[error("sync page size must be between 1 and 500, got {value}")]
    InvalidPageSize { value: u32 },
    #[error("max full sync messages must be positive, got {value}")]
    InvalidMaxFullSyncMessages { value: usize },
    #[error("token expiry margin must not exceed 3600 seconds, got {value}")]
    InvalidTokenExpiryMargin { value: u64 },
}

/// Loads configuration using layered `.env` files and `MAILMIRROR_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let google_client_id = take_string(&mut layered, "GOOGLE_CLIENT_ID");
        let google_client_secret = take_string(&mut layered, "GOOGLE_CLIENT_SECRET");
        let gmail_api_base = take_string(&mut layered, "GMAIL_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(default_gmail_api_base);
        let google_token_url =
            take_string(&mut layered, "GOOGLE_TOKEN_URL").unwrap_or_else(default_google_token_url);
        let http_timeout_seconds = take_number(&mut layered, "HTTP_TIMEOUT_SECONDS")?
            .unwrap_or_else(default_http_timeout_seconds);

        let sync = SyncConfig {
            rate_limit_delay_ms: take_number(&mut layered, "SYNC_RATE_LIMIT_DELAY_MS")?
                .unwrap_or_else(default_rate_limit_delay_ms),
            max_full_sync_messages: take_number(&mut layered, "SYNC_MAX_FULL_SYNC_MESSAGES")?
                .unwrap_or_else(default_max_full_sync_messages),
            page_size: take_number(&mut layered, "SYNC_PAGE_SIZE")?
                .unwrap_or_else(default_page_size),
            // An explicitly empty value lists every message regardless of label.
            full_sync_label_ids: layered
                .remove("SYNC_FULL_SYNC_LABEL_IDS")
                .map(|labels| {
                    labels
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(default_full_sync_label_ids),
            token_expiry_margin_seconds: take_number(
                &mut layered,
                "SYNC_TOKEN_EXPIRY_MARGIN_SECONDS",
            )?
            .unwrap_or_else(default_token_expiry_margin_seconds),
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            google_client_id,
            google_client_secret,
            gmail_api_base,
            google_token_url,
            http_timeout_seconds,
            sync,
        };

        config.validate()?;

        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_number<T: std::str::FromStr>(
    values: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match take_string(values, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(None),
    }
}

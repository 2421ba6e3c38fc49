//! # Mail Mirror Library
//!
//! Keeps a local mirror of a Gmail mailbox (messages, labels, read state) in
//! step with the remote source through full and incremental sync passes.

pub mod config;
pub mod db;
pub mod error;
pub mod gmail;
pub mod models;
pub mod normalization;
pub mod repositories;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod token_manager;
pub use migration;

pub use error::{StoreError, SyncError};
pub use sync::{MailboxSync, SyncMode, SyncOptions, SyncSummary};

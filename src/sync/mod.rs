//! # Mailbox Synchronization
//!
//! Full and incremental sync passes, change-log classification, label
//! application, and the per-account lock that keeps passes from overlapping.

pub mod classifier;
pub mod executor;
pub mod labels;
pub mod lock;

pub use classifier::{PageClassification, classify_page};
pub use executor::{MailboxSync, SyncMode, SyncOptions, SyncSummary};
pub use lock::{AccountGuard, AccountLocks};

//! Gmail REST v1 integration: wire types and the authenticated client.

pub mod client;
pub mod types;

pub use client::{GmailClient, MessageFormat, QueryValue};

/// Headers requested for metadata-only fetches.
pub const METADATA_HEADERS: &[&str] = &["Subject", "From", "To", "Date", "Delivered-To"];

/// Change-log entry types requested from the history endpoint.
pub const HISTORY_TYPES: &[&str] = &[
    "messageAdded",
    "messageDeleted",
    "labelAdded",
    "labelRemoved",
];

//! # Data Models
//!
//! SeaORM entities for the mirrored mailbox: accounts with their sync state,
//! messages, and labels.

pub mod account;
pub mod mail_label;
pub mod mail_message;

pub use account::Entity as Account;
pub use mail_label::Entity as MailLabel;
pub use mail_message::Entity as MailMessage;

//! Database migrations for the mailbox mirror.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_090000_create_accounts;
mod m2025_11_10_090100_create_mail_messages;
mod m2025_11_10_090200_create_mail_labels;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_090000_create_accounts::Migration),
            Box::new(m2025_11_10_090100_create_mail_messages::Migration),
            Box::new(m2025_11_10_090200_create_mail_labels::Migration),
        ]
    }
}

//! Migration to create the accounts table.
//!
//! Accounts hold the OAuth credentials for a mirrored mailbox together with the
//! incremental sync cursor and the timestamp of the last full pass.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::EmailAddress).text().null())
                    .col(ColumnDef::new(Accounts::AccessToken).text().null())
                    .col(ColumnDef::new(Accounts::RefreshToken).text().null())
                    .col(
                        ColumnDef::new(Accounts::TokenExpiry)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Accounts::SyncCursor).text().null())
                    .col(
                        ColumnDef::new(Accounts::LastFullSyncAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    EmailAddress,
    AccessToken,
    RefreshToken,
    TokenExpiry,
    SyncCursor,
    LastFullSyncAt,
    CreatedAt,
    UpdatedAt,
}

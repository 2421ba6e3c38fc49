//! Migration to create the mail_labels table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MailLabels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MailLabels::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MailLabels::AccountId).uuid().not_null())
                    .col(ColumnDef::new(MailLabels::RemoteLabelId).text().not_null())
                    .col(ColumnDef::new(MailLabels::Name).text().not_null())
                    .col(ColumnDef::new(MailLabels::Kind).text().null())
                    .col(
                        ColumnDef::new(MailLabels::MessageListVisibility)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(MailLabels::LabelListVisibility).text().null())
                    .col(ColumnDef::new(MailLabels::TextColor).text().null())
                    .col(ColumnDef::new(MailLabels::BackgroundColor).text().null())
                    .col(ColumnDef::new(MailLabels::TotalCount).big_integer().null())
                    .col(ColumnDef::new(MailLabels::UnreadCount).big_integer().null())
                    .col(
                        ColumnDef::new(MailLabels::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mail_labels_account_id")
                            .from(MailLabels::Table, MailLabels::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mail_labels_account_remote")
                    .table(MailLabels::Table)
                    .col(MailLabels::AccountId)
                    .col(MailLabels::RemoteLabelId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_mail_labels_account_remote")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(MailLabels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MailLabels {
    Table,
    Id,
    AccountId,
    RemoteLabelId,
    Name,
    Kind,
    MessageListVisibility,
    LabelListVisibility,
    TextColor,
    BackgroundColor,
    TotalCount,
    UnreadCount,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}

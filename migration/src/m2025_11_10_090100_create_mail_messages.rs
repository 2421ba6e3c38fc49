//! Migration to create the mail_messages table.
//!
//! One row per mirrored remote message, unique per `(account_id, remote_message_id)`.
//! Every column besides the key is nullable so a partial upsert can insert a row
//! without knowing the full message.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MailMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MailMessages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MailMessages::AccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(MailMessages::RemoteMessageId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MailMessages::ThreadId).text().null())
                    .col(ColumnDef::new(MailMessages::HistoryMarker).text().null())
                    .col(ColumnDef::new(MailMessages::LabelIds).json_binary().null())
                    .col(ColumnDef::new(MailMessages::Subject).text().null())
                    .col(ColumnDef::new(MailMessages::FromAddress).text().null())
                    .col(ColumnDef::new(MailMessages::ToAddress).text().null())
                    .col(ColumnDef::new(MailMessages::Snippet).text().null())
                    .col(
                        ColumnDef::new(MailMessages::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(MailMessages::SizeEstimate).big_integer().null())
                    .col(ColumnDef::new(MailMessages::PlainBody).text().null())
                    .col(ColumnDef::new(MailMessages::HtmlBody).text().null())
                    .col(ColumnDef::new(MailMessages::Headers).json_binary().null())
                    .col(
                        ColumnDef::new(MailMessages::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MailMessages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mail_messages_account_id")
                            .from(MailMessages::Table, MailMessages::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The upsert conflict target
        manager
            .create_index(
                Index::create()
                    .name("idx_mail_messages_account_remote")
                    .table(MailMessages::Table)
                    .col(MailMessages::AccountId)
                    .col(MailMessages::RemoteMessageId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mail_messages_account_sent_at")
                    .table(MailMessages::Table)
                    .col(MailMessages::AccountId)
                    .col(MailMessages::SentAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_mail_messages_account_remote")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_mail_messages_account_sent_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(MailMessages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MailMessages {
    Table,
    Id,
    AccountId,
    RemoteMessageId,
    ThreadId,
    HistoryMarker,
    LabelIds,
    Subject,
    FromAddress,
    ToAddress,
    Snippet,
    SentAt,
    SizeEstimate,
    PlainBody,
    HtmlBody,
    Headers,
    LastSyncedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}

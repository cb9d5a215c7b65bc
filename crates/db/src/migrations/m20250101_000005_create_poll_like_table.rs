//! Create poll like table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollLike::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollLike::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollLike::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollLike::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollLike::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_like_poll")
                            .from(PollLike::Table, PollLike::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_like_user")
                            .from(PollLike::Table, PollLike::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, poll_id) - one like per user per poll
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_like_user_poll")
                    .table(PollLike::Table)
                    .col(PollLike::UserId)
                    .col(PollLike::PollId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: poll_id (for counting a poll's likes)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_like_poll_id")
                    .table(PollLike::Table)
                    .col(PollLike::PollId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollLike::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollLike {
    Table,
    Id,
    PollId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

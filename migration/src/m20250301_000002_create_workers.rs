// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Workers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Workers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Workers::Name).string().not_null())
                    .col(ColumnDef::new(Workers::Url).string().not_null())
                    .col(
                        ColumnDef::new(Workers::Status)
                            .string()
                            .not_null()
                            .default("AVAILABLE"),
                    )
                    .col(ColumnDef::new(Workers::CurrentTaskId).uuid())
                    .col(
                        ColumnDef::new(Workers::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Workers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workers_status_registered_at")
                    .table(Workers::Table)
                    .col(Workers::Status)
                    .col(Workers::RegisteredAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Workers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Workers {
    Table,
    Id,
    Name,
    Url,
    Status,
    CurrentTaskId,
    RegisteredAt,
    UpdatedAt,
}

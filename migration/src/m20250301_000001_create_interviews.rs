// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 面试表迁移
///
/// 面试记录由主业务系统维护，调度服务只读取视频文件名、
/// 题目时间戳与评估上下文，并在评估完成后回写状态
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Interviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Interviews::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Interviews::Filename).string())
                    .col(ColumnDef::new(Interviews::Timestamps).json())
                    .col(ColumnDef::new(Interviews::EvaluationContext).json())
                    .col(
                        ColumnDef::new(Interviews::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Interviews::EvaluatedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Interviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Interviews::UpdatedAt)
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
            .drop_table(Table::drop().table(Interviews::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Interviews {
    Table,
    Id,
    Filename,
    Timestamps,
    EvaluationContext,
    Status,
    EvaluatedAt,
    CreatedAt,
    UpdatedAt,
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Pipeline, Task, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的数据无法解析
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 任务仓库特质
///
/// 所有状态变更都是条件更新：只有当前记录仍与调用方观察到的
/// 状态一致时才会写入，返回 false 表示竞争失败
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;
    /// 查找面试在某条流水线上的任务
    async fn find_by_interview(
        &self,
        interview_id: Uuid,
        pipeline: Pipeline,
    ) -> Result<Option<Task>, RepositoryError>;
    /// 按创建时间升序获取可分派的任务
    ///
    /// 失败状态的任务只有在分派次数低于 `max_auto_attempts` 时才会返回
    async fn find_ready(
        &self,
        pipeline: Pipeline,
        max_auto_attempts: i32,
        limit: u64,
    ) -> Result<Vec<Task>, RepositoryError>;
    /// 条件更新状态
    async fn update_status(
        &self,
        id: Uuid,
        expected: TaskStatus,
        new_status: TaskStatus,
    ) -> Result<bool, RepositoryError>;
    /// 条件写入整条记录
    ///
    /// 仅当存储中的状态与分派次数都与 `current` 一致时，以 `next` 覆盖
    async fn compare_and_swap(&self, current: &Task, next: &Task) -> Result<bool, RepositoryError>;
    /// 统计每个工作器名下仍处于就绪状态的任务数
    async fn ready_load_by_worker(
        &self,
        pipeline: Pipeline,
    ) -> Result<HashMap<Uuid, u64>, RepositoryError>;
    /// 查找执行时间过长的任务
    async fn find_stuck(
        &self,
        pipeline: Pipeline,
        started_before: DateTime<FixedOffset>,
    ) -> Result<Vec<Task>, RepositoryError>;
}

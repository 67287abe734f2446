// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker::{Worker, WorkerStatus};
use crate::domain::repositories::task_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 工作器仓库特质
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// 注册工作器
    async fn create(&self, worker: &Worker) -> Result<Worker, RepositoryError>;
    /// 根据ID查找工作器
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Worker>, RepositoryError>;
    /// 获取全部工作器
    async fn list(&self) -> Result<Vec<Worker>, RepositoryError>;
    /// 按注册时间升序获取空闲工作器
    async fn list_available(&self) -> Result<Vec<Worker>, RepositoryError>;
    /// 无条件更新状态，置为空闲时同时清除绑定
    async fn update_status(&self, id: Uuid, status: WorkerStatus) -> Result<(), RepositoryError>;
    /// 占用空闲工作器并绑定任务
    async fn try_claim(&self, id: Uuid, task_id: Uuid) -> Result<bool, RepositoryError>;
    /// 释放仍绑定着指定任务的工作器
    async fn release(&self, id: Uuid, task_id: Uuid) -> Result<bool, RepositoryError>;
}

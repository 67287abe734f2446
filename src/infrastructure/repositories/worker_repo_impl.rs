// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::worker::{Worker, WorkerStatus};
use crate::domain::repositories::task_repository::RepositoryError;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::infrastructure::database::entities::worker as worker_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 旧系统中与 AVAILABLE 等价的状态值
const AVAILABLE_VALUES: [&str; 2] = ["AVAILABLE", "WAITING"];

/// 工作器仓库实现
#[derive(Clone)]
pub struct WorkerRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WorkerRepositoryImpl {
    /// 创建新的工作器仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<worker_entity::Model> for Worker {
    fn from(model: worker_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            status: model.status.parse().unwrap_or(WorkerStatus::Busy),
            current_task_id: model.current_task_id,
            registered_at: model.registered_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Worker> for worker_entity::ActiveModel {
    fn from(worker: Worker) -> Self {
        Self {
            id: Set(worker.id),
            name: Set(worker.name),
            url: Set(worker.url),
            status: Set(worker.status.to_string()),
            current_task_id: Set(worker.current_task_id),
            registered_at: Set(worker.registered_at),
            updated_at: Set(worker.updated_at),
        }
    }
}

#[async_trait]
impl WorkerRepository for WorkerRepositoryImpl {
    async fn create(&self, worker: &Worker) -> Result<Worker, RepositoryError> {
        let model: worker_entity::ActiveModel = worker.clone().into();
        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Worker>, RepositoryError> {
        let model = worker_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Worker>, RepositoryError> {
        let models = worker_entity::Entity::find()
            .order_by_asc(worker_entity::Column::RegisteredAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Worker::from).collect())
    }

    async fn list_available(&self) -> Result<Vec<Worker>, RepositoryError> {
        let models = worker_entity::Entity::find()
            .filter(worker_entity::Column::Status.is_in(AVAILABLE_VALUES))
            .order_by_asc(worker_entity::Column::RegisteredAt)
            .order_by_asc(worker_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Worker::from).collect())
    }

    async fn update_status(&self, id: Uuid, status: WorkerStatus) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let mut update = worker_entity::Entity::update_many()
            .col_expr(worker_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(worker_entity::Column::UpdatedAt, Expr::value(now));
        if status == WorkerStatus::Available {
            update = update.col_expr(
                worker_entity::Column::CurrentTaskId,
                Expr::value(Option::<Uuid>::None),
            );
        }

        let result = update
            .filter(worker_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn try_claim(&self, id: Uuid, task_id: Uuid) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = worker_entity::Entity::update_many()
            .col_expr(
                worker_entity::Column::Status,
                Expr::value(WorkerStatus::Busy.to_string()),
            )
            .col_expr(
                worker_entity::Column::CurrentTaskId,
                Expr::value(Some(task_id)),
            )
            .col_expr(worker_entity::Column::UpdatedAt, Expr::value(now))
            .filter(worker_entity::Column::Id.eq(id))
            .filter(worker_entity::Column::Status.is_in(AVAILABLE_VALUES))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn release(&self, id: Uuid, task_id: Uuid) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = worker_entity::Entity::update_many()
            .col_expr(
                worker_entity::Column::Status,
                Expr::value(WorkerStatus::Available.to_string()),
            )
            .col_expr(
                worker_entity::Column::CurrentTaskId,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(worker_entity::Column::UpdatedAt, Expr::value(now))
            .filter(worker_entity::Column::Id.eq(id))
            .filter(worker_entity::Column::CurrentTaskId.eq(task_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
#[path = "worker_repo_impl_test.rs"]
mod tests;

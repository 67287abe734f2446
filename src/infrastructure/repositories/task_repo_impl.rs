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

use crate::domain::models::task::{Pipeline, Task, TaskStatus};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层，所有状态变更都是带条件的单条 UPDATE
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<task_entity::Model> for Task {
    fn from(model: task_entity::Model) -> Self {
        Self {
            id: model.id,
            interview_id: model.interview_id,
            pipeline: model.pipeline.parse().unwrap_or_default(),
            status: model.status.parse().unwrap_or_default(),
            worker_id: model.worker_id,
            attempt_count: model.attempt_count,
            last_error: model.last_error,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Task> for task_entity::ActiveModel {
    fn from(task: Task) -> Self {
        Self {
            id: Set(task.id),
            interview_id: Set(task.interview_id),
            pipeline: Set(task.pipeline.to_string()),
            status: Set(task.status.to_string()),
            worker_id: Set(task.worker_id),
            attempt_count: Set(task.attempt_count),
            last_error: Set(task.last_error),
            created_at: Set(task.created_at),
            started_at: Set(task.started_at),
            completed_at: Set(task.completed_at),
            updated_at: Set(task.updated_at),
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        let model: task_entity::ActiveModel = task.clone().into();

        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        let model = task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_by_interview(
        &self,
        interview_id: Uuid,
        pipeline: Pipeline,
    ) -> Result<Option<Task>, RepositoryError> {
        let model = task_entity::Entity::find()
            .filter(task_entity::Column::InterviewId.eq(interview_id))
            .filter(task_entity::Column::Pipeline.eq(pipeline.to_string()))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_ready(
        &self,
        pipeline: Pipeline,
        max_auto_attempts: i32,
        limit: u64,
    ) -> Result<Vec<Task>, RepositoryError> {
        let models = task_entity::Entity::find()
            .filter(task_entity::Column::Pipeline.eq(pipeline.to_string()))
            .filter(
                Condition::any()
                    .add(task_entity::Column::Status.eq(pipeline.entry_status().to_string()))
                    .add(
                        Condition::all()
                            .add(
                                task_entity::Column::Status
                                    .eq(pipeline.failed_status().to_string()),
                            )
                            .add(task_entity::Column::AttemptCount.lt(max_auto_attempts)),
                    ),
            )
            .order_by_asc(task_entity::Column::CreatedAt)
            .order_by_asc(task_entity::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Task::from).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: TaskStatus,
        new_status: TaskStatus,
    ) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = task_entity::Entity::update_many()
            .col_expr(task_entity::Column::Status, Expr::value(new_status.to_string()))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .filter(task_entity::Column::Status.eq(expected.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn compare_and_swap(&self, current: &Task, next: &Task) -> Result<bool, RepositoryError> {
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(next.status.to_string()),
            )
            .col_expr(task_entity::Column::WorkerId, Expr::value(next.worker_id))
            .col_expr(
                task_entity::Column::AttemptCount,
                Expr::value(next.attempt_count),
            )
            .col_expr(
                task_entity::Column::LastError,
                Expr::value(next.last_error.clone()),
            )
            .col_expr(task_entity::Column::StartedAt, Expr::value(next.started_at))
            .col_expr(
                task_entity::Column::CompletedAt,
                Expr::value(next.completed_at),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(next.updated_at))
            .filter(task_entity::Column::Id.eq(current.id))
            .filter(task_entity::Column::Status.eq(current.status.to_string()))
            .filter(task_entity::Column::AttemptCount.eq(current.attempt_count))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn ready_load_by_worker(
        &self,
        pipeline: Pipeline,
    ) -> Result<HashMap<Uuid, u64>, RepositoryError> {
        let ready: Vec<String> = pipeline
            .ready_statuses()
            .iter()
            .map(ToString::to_string)
            .collect();

        let models = task_entity::Entity::find()
            .filter(task_entity::Column::Pipeline.eq(pipeline.to_string()))
            .filter(task_entity::Column::Status.is_in(ready))
            .filter(task_entity::Column::WorkerId.is_not_null())
            .all(self.db.as_ref())
            .await?;

        let mut load = HashMap::new();
        for worker_id in models.into_iter().filter_map(|m| m.worker_id) {
            *load.entry(worker_id).or_insert(0) += 1;
        }
        Ok(load)
    }

    async fn find_stuck(
        &self,
        pipeline: Pipeline,
        started_before: DateTime<FixedOffset>,
    ) -> Result<Vec<Task>, RepositoryError> {
        // 旧数据可能没有 started_at，退回到 updated_at 判断
        let models = task_entity::Entity::find()
            .filter(task_entity::Column::Pipeline.eq(pipeline.to_string()))
            .filter(task_entity::Column::Status.eq(pipeline.in_flight_status().to_string()))
            .filter(
                Condition::any()
                    .add(task_entity::Column::StartedAt.lte(started_before))
                    .add(
                        Condition::all()
                            .add(task_entity::Column::StartedAt.is_null())
                            .add(task_entity::Column::UpdatedAt.lte(started_before)),
                    ),
            )
            .order_by_asc(task_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Task::from).collect())
    }
}

#[cfg(test)]
#[path = "task_repo_impl_test.rs"]
mod tests;

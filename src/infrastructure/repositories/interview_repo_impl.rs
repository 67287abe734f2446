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

use crate::domain::models::evaluation::{
    CulturalFitEvaluation, EvaluationInput, MAX_EVALUATED_RESPONSES,
};
use crate::domain::models::interview::{InterviewSnapshot, QuestionTimestamp};
use crate::domain::repositories::interview_repository::InterviewRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::{
    evaluation as evaluation_entity, interview as interview_entity,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 面试评估完成后的状态值
pub const INTERVIEW_EVALUATED: &str = "EVALUATED";

/// 面试仓库实现
///
/// 面试记录由上游系统维护，这里只读取分派与评估所需的字段，
/// 并在评估完成后写回结果
#[derive(Clone)]
pub struct InterviewRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl InterviewRepositoryImpl {
    /// 创建新的面试仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<interview_entity::Model> for InterviewSnapshot {
    type Error = serde_json::Error;

    fn try_from(model: interview_entity::Model) -> Result<Self, Self::Error> {
        let timestamps: Vec<QuestionTimestamp> = match model.timestamps {
            Some(value) if !value.is_null() => serde_json::from_value(value)?,
            _ => Vec::new(),
        };

        Ok(Self {
            id: model.id,
            filename: model.filename.filter(|f| !f.trim().is_empty()),
            timestamps,
        })
    }
}

#[async_trait]
impl InterviewRepository for InterviewRepositoryImpl {
    async fn find_snapshot(&self, id: Uuid) -> Result<Option<InterviewSnapshot>, RepositoryError> {
        let model = interview_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        match model {
            Some(model) => Ok(Some(model.try_into()?)),
            None => Ok(None),
        }
    }

    async fn find_evaluation_input(
        &self,
        id: Uuid,
    ) -> Result<Option<EvaluationInput>, RepositoryError> {
        let model = interview_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        let context = match model.and_then(|m| m.evaluation_context) {
            Some(context) if !context.is_null() => context,
            _ => return Ok(None),
        };

        let mut input: EvaluationInput = serde_json::from_value(context)?;
        input.responses.truncate(MAX_EVALUATED_RESPONSES);
        Ok(Some(input))
    }

    async fn save_evaluation(
        &self,
        id: Uuid,
        evaluation: &CulturalFitEvaluation,
    ) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let result = serde_json::to_value(evaluation)?;

        let txn = self.db.begin().await?;

        let updated = interview_entity::Entity::update_many()
            .col_expr(
                interview_entity::Column::Status,
                Expr::value(INTERVIEW_EVALUATED),
            )
            .col_expr(interview_entity::Column::EvaluatedAt, Expr::value(Some(now)))
            .col_expr(interview_entity::Column::UpdatedAt, Expr::value(now))
            .filter(interview_entity::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        evaluation_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            interview_id: Set(id),
            result: Set(result),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "interview_repo_impl_test.rs"]
mod tests;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::evaluation::{CulturalFitEvaluation, EvaluationInput};
use crate::domain::models::interview::InterviewSnapshot;
use crate::domain::repositories::task_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 面试仓库特质
///
/// 面试记录归主业务系统所有，这里只暴露调度与评估需要的读写
#[async_trait]
pub trait InterviewRepository: Send + Sync {
    /// 读取分派所需的面试快照
    async fn find_snapshot(&self, id: Uuid) -> Result<Option<InterviewSnapshot>, RepositoryError>;
    /// 读取评估输入
    async fn find_evaluation_input(
        &self,
        id: Uuid,
    ) -> Result<Option<EvaluationInput>, RepositoryError>;
    /// 保存评估结果并将面试标记为已评估
    async fn save_evaluation(
        &self,
        id: Uuid,
        evaluation: &CulturalFitEvaluation,
    ) -> Result<(), RepositoryError>;
}

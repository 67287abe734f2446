// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::evaluation::{CulturalFitEvaluation, EvaluationChunk};
use anyhow::Result;
use async_trait::async_trait;

/// LLM评估服务特质
///
/// 尽力而为的外部调用，返回 `Ok(None)` 表示模型没有给出可用结果
#[async_trait]
pub trait EvaluationProvider: Send + Sync {
    /// 评估一批回答
    async fn evaluate(&self, chunk: &EvaluationChunk) -> Result<Option<CulturalFitEvaluation>>;

    /// 对合并后的结果做一次自我校正
    async fn self_critique(
        &self,
        evaluation: &CulturalFitEvaluation,
    ) -> Result<Option<CulturalFitEvaluation>>;
}

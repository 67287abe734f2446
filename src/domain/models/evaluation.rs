// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单场面试最多参与评估的回答数
pub const MAX_EVALUATED_RESPONSES: usize = 10;

/// 评估输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    pub responses: Vec<ResponseItem>,
    pub company_profile: CompanyProfile,
}

/// 候选人的一条回答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseItem {
    pub question_id: String,
    pub question_text: String,
    pub transcript: String,
    #[serde(default)]
    pub core_values: Vec<String>,
    #[serde(default)]
    pub aligns_with: Option<Alignment>,
}

/// 题目对齐的公司维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alignment {
    Mission,
    Vision,
    Culture,
}

/// 公司画像
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    /// 核心价值观名称到描述
    #[serde(default)]
    pub core_values: BTreeMap<String, String>,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub vision: Option<String>,
    #[serde(default)]
    pub culture: Option<String>,
}

/// 发给LLM的一批回答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationChunk {
    pub responses: Vec<ResponseItem>,
    pub company_profile: CompanyProfile,
}

/// 文化契合度评估结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalFitEvaluation {
    #[serde(default)]
    pub per_question_results: Vec<QuestionEvaluation>,
}

/// 单题评估
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEvaluation {
    pub question_id: String,
    #[serde(default)]
    pub culture_fit_composite: Option<CultureFitComposite>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// 单题文化契合度组成
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CultureFitComposite {
    #[serde(default)]
    pub values_fit: Vec<ValueScore>,
    #[serde(default)]
    pub mission_alignment: Option<f64>,
    #[serde(default)]
    pub vision_alignment: Option<f64>,
    #[serde(default)]
    pub culture_fit: Option<f64>,
}

/// 单个核心价值观得分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueScore {
    pub core_value: String,
    pub score: f64,
}

impl EvaluationInput {
    /// 按固定大小切分回答
    ///
    /// # 参数
    ///
    /// * `chunk_size` - 每批回答数，为0时按1处理
    ///
    /// # 返回值
    ///
    /// 返回携带公司画像的分批列表
    pub fn chunks(&self, chunk_size: usize) -> Vec<EvaluationChunk> {
        let size = chunk_size.max(1);
        self.responses
            .chunks(size)
            .map(|responses| EvaluationChunk {
                responses: responses.to_vec(),
                company_profile: self.company_profile.clone(),
            })
            .collect()
    }
}

impl CulturalFitEvaluation {
    /// 合并各批次的评估结果
    pub fn combine(results: impl IntoIterator<Item = CulturalFitEvaluation>) -> Self {
        Self {
            per_question_results: results
                .into_iter()
                .flat_map(|r| r.per_question_results)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_question_results.is_empty()
    }
}

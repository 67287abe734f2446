// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LlmSettings;
use crate::domain::models::evaluation::{CulturalFitEvaluation, EvaluationChunk};
use crate::domain::services::evaluation_provider::EvaluationProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

const EVALUATION_SCHEMA: &str = r#"{
  "perQuestionResults": [
    {
      "questionId": "string",
      "cultureFitComposite": {
        "valuesFit": [{ "coreValue": "string", "score": 0.0 }],
        "missionAlignment": 0.0,
        "visionAlignment": 0.0,
        "cultureFit": 0.0
      },
      "feedback": "string"
    }
  ]
}"#;

/// 基于 OpenAI 兼容接口的评估服务
///
/// # 配置
///
/// - `api_key` - API 密钥，未配置时每次调用都返回错误
/// - `model` - 模型名称
/// - `api_base_url` - 接口基础地址，请求发往 `{api_base_url}/chat/completions`
pub struct LlmEvaluationProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_base_url: String,
}

impl LlmEvaluationProvider {
    pub fn new(settings: &LlmSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn evaluation_prompt(chunk: &EvaluationChunk) -> Result<String> {
        let profile = &chunk.company_profile;
        Ok(format!(
            "You are an expert cultural fit evaluator for hiring purposes.\n\
            For each candidate response, evaluate how well the answer aligns with the assigned \
            core values and with the company's mission, vision or culture as given by its \
            \"alignsWith\" field. Score from 0.0 (no alignment) to 1.0 (perfect fit). \
            Every question must have an entry using its questionId. If uncertain, give low \
            scores but never skip a question.\n\
            Return ONLY a JSON object matching this schema, no markdown formatting:\n{}\n\n\
            Company core value definitions:\n{}\n\n\
            Candidate responses:\n{}\n\n\
            Company mission: \"{}\"\nCompany vision: \"{}\"\nCompany culture: \"{}\"",
            EVALUATION_SCHEMA,
            serde_json::to_string_pretty(&profile.core_values)?,
            serde_json::to_string_pretty(&chunk.responses)?,
            profile.mission.as_deref().unwrap_or_default(),
            profile.vision.as_deref().unwrap_or_default(),
            profile.culture.as_deref().unwrap_or_default(),
        ))
    }

    fn critique_prompt(evaluation: &CulturalFitEvaluation) -> Result<String> {
        Ok(format!(
            "You are a self-critic. Review the following evaluation result against the \
            expected schema. Correct any mistakes or inconsistencies so that it strictly \
            adheres to the schema, otherwise return it unchanged.\n\
            Return ONLY the corrected JSON object, no markdown formatting.\n\n\
            Expected schema:\n{}\n\nEvaluation JSON:\n{}",
            EVALUATION_SCHEMA,
            serde_json::to_string(evaluation)?,
        ))
    }

    /// 发送一次对话补全请求并返回模型输出的文本
    async fn complete(&self, prompt: String) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("LLM API key not configured"))?;

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a careful hiring evaluator. You output only valid JSON."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.0
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "LLM API returned error: {} - {}",
                status,
                error_text
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse LLM API response")?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid response format from LLM API"))
    }
}

/// 去掉模型可能包裹的 markdown 代码块并解析结果
///
/// 无法解析时返回 None
pub fn parse_evaluation(content: &str) -> Option<CulturalFitEvaluation> {
    let clean_content = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<CulturalFitEvaluation>(clean_content) {
        Ok(evaluation) => Some(evaluation),
        Err(e) => {
            warn!("Unparsable evaluation returned by LLM: {}", e);
            None
        }
    }
}

#[async_trait]
impl EvaluationProvider for LlmEvaluationProvider {
    async fn evaluate(&self, chunk: &EvaluationChunk) -> Result<Option<CulturalFitEvaluation>> {
        let content = self.complete(Self::evaluation_prompt(chunk)?).await?;
        Ok(parse_evaluation(&content))
    }

    async fn self_critique(
        &self,
        evaluation: &CulturalFitEvaluation,
    ) -> Result<Option<CulturalFitEvaluation>> {
        let content = self.complete(Self::critique_prompt(evaluation)?).await?;
        Ok(parse_evaluation(&content))
    }
}

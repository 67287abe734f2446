// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::models::evaluation::CulturalFitEvaluation;
use crate::domain::models::task::{Pipeline, Task};
use crate::domain::repositories::interview_repository::InterviewRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::services::evaluation_provider::EvaluationProvider;
use crate::utils::errors::DispatchError;
use crate::workers::evaluation_guard::EvaluationGuard;

/// 失败的评估任务只能通过显式重试回到入口状态
const EVALUATION_AUTO_ATTEMPTS: i32 = 0;

/// 一次评估运行的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// 已有评估在运行
    Skipped,
    /// 没有待评估的任务
    NothingToDo,
    Evaluated { task_id: Uuid },
    Failed { task_id: Uuid, reason: String },
    /// 任务已被其他调用方处理
    RaceLost,
}

impl EvaluationOutcome {
    fn label(&self) -> &'static str {
        match self {
            EvaluationOutcome::Skipped => "skipped",
            EvaluationOutcome::NothingToDo => "nothing_to_do",
            EvaluationOutcome::Evaluated { .. } => "evaluated",
            EvaluationOutcome::Failed { .. } => "failed",
            EvaluationOutcome::RaceLost => "race_lost",
        }
    }
}

/// 评估触发器
///
/// 每次运行取最早的待评估任务，分批调用 LLM 评估、合并后自我校正，
/// 再写回面试记录。整个过程持有 [`EvaluationGuard`] 许可。
pub struct EvaluationWorker {
    tasks: Arc<dyn TaskRepository>,
    interviews: Arc<dyn InterviewRepository>,
    provider: Arc<dyn EvaluationProvider>,
    guard: EvaluationGuard,
    chunk_size: usize,
}

impl EvaluationWorker {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        interviews: Arc<dyn InterviewRepository>,
        provider: Arc<dyn EvaluationProvider>,
        guard: EvaluationGuard,
        chunk_size: usize,
    ) -> Self {
        Self {
            tasks,
            interviews,
            provider,
            guard,
            chunk_size,
        }
    }

    /// 共享的评估锁
    pub fn guard(&self) -> &EvaluationGuard {
        &self.guard
    }

    /// 在后台运行一次评估
    pub fn spawn_next(self: &Arc<Self>) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = worker.run_next_evaluation().await {
                error!("Evaluation run failed: {}", e);
            }
        })
    }

    /// 运行一次评估
    ///
    /// # 返回值
    ///
    /// * `Ok(EvaluationOutcome)` - 本次运行结果
    /// * `Err(DispatchError)` - 任务存储不可用
    pub async fn run_next_evaluation(&self) -> Result<EvaluationOutcome, DispatchError> {
        let Some(_permit) = self.guard.try_acquire() else {
            warn!("Evaluation already running, skipping");
            metrics::counter!("evaluations_total", "outcome" => "skipped").increment(1);
            return Ok(EvaluationOutcome::Skipped);
        };

        let outcome = self.evaluate_oldest().await?;
        metrics::counter!("evaluations_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    async fn evaluate_oldest(&self) -> Result<EvaluationOutcome, DispatchError> {
        let ready = self
            .tasks
            .find_ready(Pipeline::Evaluation, EVALUATION_AUTO_ATTEMPTS, 1)
            .await?;
        let Some(task) = ready.into_iter().next() else {
            return Ok(EvaluationOutcome::NothingToDo);
        };

        let Ok(started) = task.clone().start(None) else {
            return Ok(EvaluationOutcome::RaceLost);
        };
        if !self.tasks.compare_and_swap(&task, &started).await? {
            warn!("Evaluation task {} was taken concurrently", task.id);
            return Ok(EvaluationOutcome::RaceLost);
        }
        info!(
            "Evaluating interview {} (task {})",
            started.interview_id, started.id
        );

        match self.evaluate(&started).await {
            Ok(()) => self.finish(started).await,
            Err(reason) => self.record_failure(started, reason).await,
        }
    }

    async fn finish(&self, started: Task) -> Result<EvaluationOutcome, DispatchError> {
        let task_id = started.id;
        let Ok(done) = started.clone().complete() else {
            return Ok(EvaluationOutcome::RaceLost);
        };
        if !self.tasks.compare_and_swap(&started, &done).await? {
            warn!("Evaluation task {} changed while evaluating", task_id);
            return Ok(EvaluationOutcome::RaceLost);
        }
        info!("Evaluation task {} completed", task_id);
        Ok(EvaluationOutcome::Evaluated { task_id })
    }

    async fn record_failure(
        &self,
        started: Task,
        reason: String,
    ) -> Result<EvaluationOutcome, DispatchError> {
        let task_id = started.id;
        error!("Evaluation task {} failed: {}", task_id, reason);
        let Ok(failed) = started.clone().fail(reason.clone()) else {
            return Ok(EvaluationOutcome::RaceLost);
        };
        if !self.tasks.compare_and_swap(&started, &failed).await? {
            return Ok(EvaluationOutcome::RaceLost);
        }
        Ok(EvaluationOutcome::Failed { task_id, reason })
    }

    /// 分批评估、合并、自我校正并保存
    async fn evaluate(&self, task: &Task) -> Result<(), String> {
        let input = self
            .interviews
            .find_evaluation_input(task.interview_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "evaluation input missing".to_string())?;

        if input.responses.is_empty() {
            return Err("no responses to evaluate".to_string());
        }

        let mut results = Vec::new();
        for (index, chunk) in input.chunks(self.chunk_size).iter().enumerate() {
            match self.provider.evaluate(chunk).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => warn!("Chunk {} of task {} returned no result", index, task.id),
                Err(e) => warn!("Chunk {} of task {} failed: {}", index, task.id, e),
            }
        }

        let combined = CulturalFitEvaluation::combine(results);
        if combined.is_empty() {
            return Err("all chunk evaluations failed".to_string());
        }

        let corrected = match self.provider.self_critique(&combined).await {
            Ok(Some(corrected)) if !corrected.is_empty() => corrected,
            Ok(_) => return Err("self-critique failed".to_string()),
            Err(e) => return Err(format!("self-critique failed: {}", e)),
        };

        self.interviews
            .save_evaluation(task.interview_id, &corrected)
            .await
            .map_err(|e| format!("saving evaluation failed: {}", e))
    }
}

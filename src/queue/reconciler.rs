// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Pipeline, Task, TaskStatus};
use crate::domain::models::worker::WorkerStatus;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::queue::dispatcher::Dispatcher;
use crate::utils::errors::DispatchError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 工作器在仍持有任务时报告空闲所使用的失败原因
pub const IDLE_WITH_TASK_REASON: &str = "worker reported idle with task in flight";

/// 回调处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// 状态已变更
    Applied,
    /// 重复投递，目标状态早已达成
    AlreadyApplied,
    /// 任务或工作器不存在
    NotFound,
    /// 当前状态不允许该变更
    StateMismatch { current: TaskStatus },
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied => "applied",
            ReconcileOutcome::AlreadyApplied => "already_applied",
            ReconcileOutcome::NotFound => "not_found",
            ReconcileOutcome::StateMismatch { .. } => "state_mismatch",
        }
    }
}

/// 工作器通过 `on_status` 回调报告的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Processed,
    Failed,
    /// 心跳
    Processing,
}

/// 通用状态回调的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ReportedStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// 状态协调器
///
/// 处理工作器的异步回调，推进任务与工作器状态，并在有资源释放时
/// 触发下一次分派。所有操作对重复投递保持幂等。
pub struct StatusReconciler {
    tasks: Arc<dyn TaskRepository>,
    workers: Arc<dyn WorkerRepository>,
    dispatcher: Arc<Dispatcher>,
}

impl StatusReconciler {
    /// 创建状态协调器
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `workers` - 工作器仓库
    /// * `dispatcher` - 用于触发后续分派
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        workers: Arc<dyn WorkerRepository>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            tasks,
            workers,
            dispatcher,
        }
    }

    /// 任务完成
    ///
    /// 处理任务完成时会同时创建该面试的评估任务
    ///
    /// # 参数
    ///
    /// * `task_id` - 任务ID
    ///
    /// # 返回值
    ///
    /// * `Ok(ReconcileOutcome)` - 处理结果
    /// * `Err(DispatchError)` - 存储不可用
    pub async fn mark_processed(&self, task_id: Uuid) -> Result<ReconcileOutcome, DispatchError> {
        let outcome = self.complete(task_id).await?;
        record("mark_processed", &outcome);
        Ok(outcome)
    }

    async fn complete(&self, task_id: Uuid) -> Result<ReconcileOutcome, DispatchError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            warn!("Processed callback for unknown task {}", task_id);
            return Ok(ReconcileOutcome::NotFound);
        };
        let pipeline = task.pipeline;
        if task.status == pipeline.done_status() {
            // 首次投递可能在后续步骤失败，重复投递负责补齐
            if self.settle_completed(&task).await? {
                self.nudge_dispatcher(pipeline, None).await;
            }
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let Ok(done) = task.clone().complete() else {
            warn!("Task {} cannot complete from {}", task_id, task.status);
            return Ok(ReconcileOutcome::StateMismatch {
                current: task.status,
            });
        };
        if !self.tasks.compare_and_swap(&task, &done).await? {
            let outcome = self.after_lost_race(task_id, pipeline.done_status()).await?;
            if outcome == ReconcileOutcome::AlreadyApplied && self.settle_completed(&task).await? {
                self.nudge_dispatcher(pipeline, None).await;
            }
            return Ok(outcome);
        }
        info!("Task {} is {}", task_id, done.status);

        self.settle_completed(&task).await?;
        self.nudge_dispatcher(pipeline, None).await;

        Ok(ReconcileOutcome::Applied)
    }

    /// 完成后的后续步骤：创建评估任务并释放工作器
    ///
    /// 可重复执行，返回工作器是否由本次调用释放
    async fn settle_completed(&self, task: &Task) -> Result<bool, DispatchError> {
        if task.pipeline == Pipeline::Processing {
            ensure_evaluation_task(self.tasks.as_ref(), task.interview_id).await?;
        }
        self.release_worker(task).await
    }

    /// 任务失败
    ///
    /// 失败的任务不会被本次回调重新分派，只会为其他就绪任务触发分派
    ///
    /// # 参数
    ///
    /// * `task_id` - 任务ID
    /// * `reason` - 失败原因
    pub async fn mark_failed(
        &self,
        task_id: Uuid,
        reason: &str,
    ) -> Result<ReconcileOutcome, DispatchError> {
        let outcome = self.fail(task_id, reason).await?;
        record("mark_failed", &outcome);
        Ok(outcome)
    }

    async fn fail(&self, task_id: Uuid, reason: &str) -> Result<ReconcileOutcome, DispatchError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            warn!("Failed callback for unknown task {}", task_id);
            return Ok(ReconcileOutcome::NotFound);
        };
        let pipeline = task.pipeline;
        if task.status == pipeline.failed_status() {
            if self.release_worker(&task).await? {
                self.nudge_dispatcher(pipeline, Some(task_id)).await;
            }
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let Ok(failed) = task.clone().fail(reason) else {
            warn!("Task {} cannot fail from {}", task_id, task.status);
            return Ok(ReconcileOutcome::StateMismatch {
                current: task.status,
            });
        };
        if !self.tasks.compare_and_swap(&task, &failed).await? {
            let outcome = self.after_lost_race(task_id, pipeline.failed_status()).await?;
            if outcome == ReconcileOutcome::AlreadyApplied && self.release_worker(&task).await? {
                self.nudge_dispatcher(pipeline, Some(task_id)).await;
            }
            return Ok(outcome);
        }
        warn!("Task {} failed: {}", task_id, reason);

        self.release_worker(&task).await?;
        self.nudge_dispatcher(pipeline, Some(task_id)).await;

        Ok(ReconcileOutcome::Applied)
    }

    /// 显式重试，失败任务回到入口状态
    ///
    /// # 参数
    ///
    /// * `task_id` - 任务ID
    pub async fn retry(&self, task_id: Uuid) -> Result<ReconcileOutcome, DispatchError> {
        let outcome = self.reset(task_id).await?;
        record("retry", &outcome);
        Ok(outcome)
    }

    async fn reset(&self, task_id: Uuid) -> Result<ReconcileOutcome, DispatchError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            warn!("Retry requested for unknown task {}", task_id);
            return Ok(ReconcileOutcome::NotFound);
        };
        let pipeline = task.pipeline;
        if task.status == pipeline.entry_status() {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let Ok(retried) = task.clone().retry() else {
            return Ok(ReconcileOutcome::StateMismatch {
                current: task.status,
            });
        };
        if !self.tasks.compare_and_swap(&task, &retried).await? {
            return self.after_lost_race(task_id, pipeline.entry_status()).await;
        }
        info!("Task {} reset to {} for retry", task_id, retried.status);

        self.nudge_dispatcher(pipeline, None).await;
        Ok(ReconcileOutcome::Applied)
    }

    /// 工作器报告空闲
    ///
    /// `after_task` 是工作器刚结束的任务。工作器已被分配了其他任务时，
    /// 这是一条过期的通知，不做任何改动。否则若绑定的任务仍在执行中，
    /// 该任务会被标记为失败，且不会被本次调用重新分派。
    ///
    /// # 参数
    ///
    /// * `worker_id` - 工作器ID
    /// * `after_task` - 工作器刚结束的任务ID
    pub async fn worker_idle(
        &self,
        worker_id: Uuid,
        after_task: Option<Uuid>,
    ) -> Result<ReconcileOutcome, DispatchError> {
        let (outcome, failed_task) = self.free_worker(worker_id, after_task).await?;
        record("worker_idle", &outcome);
        if outcome != ReconcileOutcome::NotFound {
            self.nudge_dispatcher(Pipeline::Processing, failed_task).await;
        }
        Ok(outcome)
    }

    async fn free_worker(
        &self,
        worker_id: Uuid,
        after_task: Option<Uuid>,
    ) -> Result<(ReconcileOutcome, Option<Uuid>), DispatchError> {
        let Some(worker) = self.workers.find_by_id(worker_id).await? else {
            warn!("Idle callback for unknown worker {}", worker_id);
            return Ok((ReconcileOutcome::NotFound, None));
        };

        let Some(task_id) = worker.current_task_id else {
            if worker.status == WorkerStatus::Busy {
                self.workers
                    .update_status(worker_id, WorkerStatus::Available)
                    .await?;
                info!("Worker {} is available", worker_id);
                return Ok((ReconcileOutcome::Applied, None));
            }
            return Ok((ReconcileOutcome::AlreadyApplied, None));
        };

        if after_task.is_some_and(|finished| finished != task_id) {
            debug!(
                "Worker {} already moved on to task {}, ignoring idle notice",
                worker_id, task_id
            );
            return Ok((ReconcileOutcome::AlreadyApplied, None));
        }

        let mut failed_task = None;
        if let Some(task) = self.tasks.find_by_id(task_id).await? {
            if task.status.is_in_flight() && task.worker_id == Some(worker_id) {
                if let Ok(failed) = task.clone().fail(IDLE_WITH_TASK_REASON) {
                    if self.tasks.compare_and_swap(&task, &failed).await? {
                        warn!(
                            "Worker {} went idle while task {} was in flight",
                            worker_id, task_id
                        );
                        failed_task = Some(task_id);
                    }
                }
            }
        }

        let outcome = if self.workers.release(worker_id, task_id).await? {
            info!("Worker {} is available", worker_id);
            ReconcileOutcome::Applied
        } else {
            ReconcileOutcome::AlreadyApplied
        };
        Ok((outcome, failed_task))
    }

    /// 通用状态回调
    ///
    /// `processing` 视为心跳，只刷新更新时间
    pub async fn apply_status(
        &self,
        task_id: Uuid,
        update: StatusUpdate,
    ) -> Result<ReconcileOutcome, DispatchError> {
        match update.status {
            ReportedStatus::Processed => self.mark_processed(task_id).await,
            ReportedStatus::Failed => {
                let reason = update
                    .reason
                    .unwrap_or_else(|| "worker reported failure".to_string());
                self.mark_failed(task_id, &reason).await
            }
            ReportedStatus::Processing => {
                let outcome = self.heartbeat(task_id).await?;
                record("heartbeat", &outcome);
                Ok(outcome)
            }
        }
    }

    async fn heartbeat(&self, task_id: Uuid) -> Result<ReconcileOutcome, DispatchError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            return Ok(ReconcileOutcome::NotFound);
        };
        if !task.status.is_in_flight() {
            return Ok(ReconcileOutcome::StateMismatch {
                current: task.status,
            });
        }
        if self
            .tasks
            .update_status(task_id, task.status, task.status)
            .await?
        {
            Ok(ReconcileOutcome::Applied)
        } else {
            self.after_lost_race(task_id, task.status).await
        }
    }

    /// 工作器仍绑定该任务时释放它
    async fn release_worker(&self, task: &Task) -> Result<bool, DispatchError> {
        let Some(worker_id) = task.worker_id else {
            return Ok(false);
        };
        let released = self.workers.release(worker_id, task.id).await?;
        if !released {
            debug!("Worker {} no longer holds task {}", worker_id, task.id);
        }
        Ok(released)
    }

    /// 条件更新失败后重新读取，判断是重复投递还是状态冲突
    async fn after_lost_race(
        &self,
        task_id: Uuid,
        target: TaskStatus,
    ) -> Result<ReconcileOutcome, DispatchError> {
        match self.tasks.find_by_id(task_id).await? {
            Some(current) if current.status == target => Ok(ReconcileOutcome::AlreadyApplied),
            Some(current) => {
                warn!("Lost race on task {}, now {}", task_id, current.status);
                Ok(ReconcileOutcome::StateMismatch {
                    current: current.status,
                })
            }
            None => Ok(ReconcileOutcome::NotFound),
        }
    }

    /// 资源释放后尝试分派，失败只记录日志
    async fn nudge_dispatcher(&self, pipeline: Pipeline, exclude: Option<Uuid>) {
        if pipeline != Pipeline::Processing {
            return;
        }
        let result = match exclude {
            Some(task_id) => self.dispatcher.dispatch_next_excluding(task_id).await,
            None => self.dispatcher.dispatch_next().await,
        };
        if let Err(e) = result {
            error!("Dispatch after callback failed: {}", e);
        }
    }
}

/// 确保面试存在评估任务，已存在时不做任何事
///
/// # 参数
///
/// * `tasks` - 任务仓库
/// * `interview_id` - 面试ID
pub async fn ensure_evaluation_task(
    tasks: &dyn TaskRepository,
    interview_id: Uuid,
) -> Result<(), DispatchError> {
    if tasks
        .find_by_interview(interview_id, Pipeline::Evaluation)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let task = Task::new(interview_id, Pipeline::Evaluation);
    match tasks.create(&task).await {
        Ok(created) => {
            info!(
                "Evaluation task {} created for interview {}",
                created.id, interview_id
            );
            Ok(())
        }
        Err(e) => {
            // 另一个回调可能已经创建
            if tasks
                .find_by_interview(interview_id, Pipeline::Evaluation)
                .await?
                .is_some()
            {
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}

fn record(operation: &'static str, outcome: &ReconcileOutcome) {
    metrics::counter!(
        "callbacks_total",
        "operation" => operation,
        "outcome" => outcome.label()
    )
    .increment(1);
}

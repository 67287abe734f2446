// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Pipeline, Task};
use crate::domain::models::worker::Worker;
use crate::domain::repositories::interview_repository::InterviewRepository;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::domain::services::invoker::WorkerInvoker;
use crate::domain::services::payload_builder::{PayloadBuilder, PayloadError};
use crate::utils::errors::DispatchError;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 单次分派读取的就绪任务上限
const READY_SCAN_LIMIT: u64 = 50;

/// 单次分派的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// 没有就绪任务
    NothingToDo,
    /// 有就绪任务但没有空闲工作器
    QueuedNoWorker { task_id: Uuid },
    /// 任务已交给工作器
    Dispatched { task_id: Uuid, worker_id: Uuid },
    /// 调用工作器失败，任务与工作器已恢复到分派前的状态
    InvocationFailed {
        task_id: Uuid,
        worker_id: Uuid,
        error: String,
    },
    /// 无法为任务构建请求，任务已标记为失败
    PayloadFailed { task_id: Uuid, reason: String },
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::NothingToDo => "nothing_to_do",
            DispatchOutcome::QueuedNoWorker { .. } => "queued_no_worker",
            DispatchOutcome::Dispatched { .. } => "dispatched",
            DispatchOutcome::InvocationFailed { .. } => "invocation_failed",
            DispatchOutcome::PayloadFailed { .. } => "payload_failed",
        }
    }
}

/// 入队结果
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueOutcome {
    /// 面试对应的处理任务
    pub task: Task,
    /// 是否为本次新建
    pub created: bool,
    /// 随后的分派结果
    pub dispatch: DispatchOutcome,
}

/// 分派器
///
/// 为处理流水线中的就绪任务挑选空闲工作器并完成交接。
/// 工作器与任务的状态变更都是条件更新，竞争失败时换下一个候选，
/// 不会产生错误。
pub struct Dispatcher {
    tasks: Arc<dyn TaskRepository>,
    workers: Arc<dyn WorkerRepository>,
    interviews: Arc<dyn InterviewRepository>,
    invoker: Arc<dyn WorkerInvoker>,
    payloads: Arc<PayloadBuilder>,
    max_auto_attempts: i32,
}

impl Dispatcher {
    /// 创建分派器
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `workers` - 工作器仓库
    /// * `interviews` - 面试仓库
    /// * `invoker` - 工作器调用器
    /// * `payloads` - 请求构建器
    /// * `max_auto_attempts` - 失败任务自动重新分派的次数上限
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        workers: Arc<dyn WorkerRepository>,
        interviews: Arc<dyn InterviewRepository>,
        invoker: Arc<dyn WorkerInvoker>,
        payloads: Arc<PayloadBuilder>,
        max_auto_attempts: i32,
    ) -> Self {
        Self {
            tasks,
            workers,
            interviews,
            invoker,
            payloads,
            max_auto_attempts,
        }
    }

    /// 为面试创建处理任务并尝试立即分派
    ///
    /// 同一面试重复入队时返回已有任务
    ///
    /// # 返回值
    ///
    /// * `Ok(EnqueueOutcome)` - 任务及分派结果
    /// * `Err(DispatchError)` - 面试不存在或存储不可用
    pub async fn enqueue(&self, interview_id: Uuid) -> Result<EnqueueOutcome, DispatchError> {
        if self.interviews.find_snapshot(interview_id).await?.is_none() {
            return Err(RepositoryError::NotFound.into());
        }

        let (task, created) = match self
            .tasks
            .find_by_interview(interview_id, Pipeline::Processing)
            .await?
        {
            Some(existing) => (existing, false),
            None => match self
                .tasks
                .create(&Task::new(interview_id, Pipeline::Processing))
                .await
            {
                Ok(task) => (task, true),
                Err(e) => {
                    // 并发入队时唯一索引会拒绝第二条记录
                    match self
                        .tasks
                        .find_by_interview(interview_id, Pipeline::Processing)
                        .await?
                    {
                        Some(existing) => (existing, false),
                        None => return Err(e.into()),
                    }
                }
            },
        };

        if created {
            info!("Enqueued task {} for interview {}", task.id, interview_id);
        }

        let dispatch = self.dispatch_next().await?;
        Ok(EnqueueOutcome {
            task,
            created,
            dispatch,
        })
    }

    /// 分派最早的就绪任务
    pub async fn dispatch_next(&self) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch_with_exclusions(&[]).await
    }

    /// 分派最早的就绪任务，但跳过指定任务
    ///
    /// 失败回调使用它来避免刚失败的任务被立即重新分派
    pub async fn dispatch_next_excluding(
        &self,
        task_id: Uuid,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch_with_exclusions(&[task_id]).await
    }

    /// 持续分派直到没有可分派的任务或工作器
    ///
    /// # 返回值
    ///
    /// 成功交接的任务数
    pub async fn dispatch_all(&self) -> Result<usize, DispatchError> {
        let rounds = self.workers.list_available().await?.len();
        let mut excluded = Vec::new();
        let mut dispatched = 0;

        for _ in 0..rounds {
            match self.dispatch_with_exclusions(&excluded).await? {
                DispatchOutcome::Dispatched { .. } => dispatched += 1,
                DispatchOutcome::InvocationFailed { task_id, .. }
                | DispatchOutcome::PayloadFailed { task_id, .. } => excluded.push(task_id),
                DispatchOutcome::NothingToDo | DispatchOutcome::QueuedNoWorker { .. } => break,
            }
        }

        Ok(dispatched)
    }

    async fn dispatch_with_exclusions(
        &self,
        excluded: &[Uuid],
    ) -> Result<DispatchOutcome, DispatchError> {
        let outcome = self.try_dispatch(excluded).await?;
        metrics::counter!("dispatch_attempts_total", "outcome" => outcome.label()).increment(1);
        Ok(outcome)
    }

    async fn try_dispatch(&self, excluded: &[Uuid]) -> Result<DispatchOutcome, DispatchError> {
        let ready: Vec<Task> = self
            .tasks
            .find_ready(
                Pipeline::Processing,
                self.max_auto_attempts,
                READY_SCAN_LIMIT + excluded.len() as u64,
            )
            .await?
            .into_iter()
            .filter(|t| !excluded.contains(&t.id))
            .collect();

        let Some(oldest) = ready.first().map(|t| t.id) else {
            return Ok(DispatchOutcome::NothingToDo);
        };

        let mut candidates = self.ranked_workers().await?;
        if candidates.is_empty() {
            debug!("Task {} queued, no available worker", oldest);
            return Ok(DispatchOutcome::QueuedNoWorker { task_id: oldest });
        }

        for task in ready {
            let Some(worker) = self.claim_first(&mut candidates, task.id).await? else {
                debug!("Every candidate worker was taken, task {} stays queued", task.id);
                return Ok(DispatchOutcome::QueuedNoWorker { task_id: task.id });
            };

            let bound = match task.clone().start(Some(worker.id)) {
                Ok(bound) => bound,
                Err(e) => {
                    warn!("Skipping task {}: {}", task.id, e);
                    self.workers.release(worker.id, task.id).await?;
                    candidates.insert(0, worker);
                    continue;
                }
            };

            if !self.tasks.compare_and_swap(&task, &bound).await? {
                warn!("Lost race binding task {}, trying next task", task.id);
                self.workers.release(worker.id, task.id).await?;
                candidates.insert(0, worker);
                continue;
            }

            info!(
                "Task {} bound to worker {} (attempt {})",
                bound.id, worker.id, bound.attempt_count
            );
            return self.hand_off(task, bound, worker).await;
        }

        // 所有就绪任务都被其他调用方抢先绑定
        Ok(DispatchOutcome::NothingToDo)
    }

    /// 按负载升序、注册时间升序排列空闲工作器
    async fn ranked_workers(&self) -> Result<Vec<Worker>, DispatchError> {
        let mut available = self.workers.list_available().await?;
        if available.is_empty() {
            return Ok(available);
        }

        let load = self.tasks.ready_load_by_worker(Pipeline::Processing).await?;
        available.sort_by_key(|w| (load.get(&w.id).copied().unwrap_or(0), w.registered_at));
        Ok(available)
    }

    /// 依次尝试占用候选工作器，被他人抢占的候选会被移除
    async fn claim_first(
        &self,
        candidates: &mut Vec<Worker>,
        task_id: Uuid,
    ) -> Result<Option<Worker>, DispatchError> {
        while !candidates.is_empty() {
            let worker = candidates.remove(0);
            if self.workers.try_claim(worker.id, task_id).await? {
                return Ok(Some(worker));
            }
            debug!("Worker {} was claimed concurrently", worker.id);
        }
        Ok(None)
    }

    /// 构建请求并调用工作器，失败时回滚
    async fn hand_off(
        &self,
        snapshot: Task,
        bound: Task,
        worker: Worker,
    ) -> Result<DispatchOutcome, DispatchError> {
        let payload = match self.payloads.build(&bound, &worker).await {
            Ok(payload) => payload,
            Err(PayloadError::Repository(e)) => {
                self.revert(&snapshot, &bound, &worker).await?;
                return Err(e.into());
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Cannot build payload for task {}: {}", bound.id, reason);
                if let Ok(failed) = bound.clone().fail(reason.clone()) {
                    if !self.tasks.compare_and_swap(&bound, &failed).await? {
                        warn!(
                            "Task {} changed before its payload failure was recorded",
                            bound.id
                        );
                    }
                }
                self.workers.release(worker.id, bound.id).await?;
                return Ok(DispatchOutcome::PayloadFailed {
                    task_id: bound.id,
                    reason,
                });
            }
        };

        match self.invoker.invoke(&worker, &payload).await {
            Ok(()) => {
                metrics::counter!("dispatch_success_total").increment(1);
                info!("Task {} handed off to worker {}", bound.id, worker.id);
                Ok(DispatchOutcome::Dispatched {
                    task_id: bound.id,
                    worker_id: worker.id,
                })
            }
            Err(e) => {
                metrics::counter!("dispatch_invocation_failed_total").increment(1);
                error!(
                    "Invocation of worker {} for task {} failed: {}",
                    worker.id, bound.id, e
                );
                self.revert(&snapshot, &bound, &worker).await?;
                Ok(DispatchOutcome::InvocationFailed {
                    task_id: bound.id,
                    worker_id: worker.id,
                    error: e.to_string(),
                })
            }
        }
    }

    /// 任务恢复到分派前的快照，工作器恢复空闲
    async fn revert(
        &self,
        snapshot: &Task,
        bound: &Task,
        worker: &Worker,
    ) -> Result<(), DispatchError> {
        let mut restored = snapshot.clone();
        let now: DateTime<FixedOffset> = Utc::now().into();
        restored.updated_at = now;

        if !self.tasks.compare_and_swap(bound, &restored).await? {
            warn!("Task {} changed before revert, leaving it as is", bound.id);
        }
        self.workers.release(worker.id, bound.id).await?;
        Ok(())
    }
}

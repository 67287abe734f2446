// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Pipeline, TaskStatus};
use crate::domain::models::worker::{Worker, WorkerStatus};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::queue::dispatcher::Dispatcher;
use crate::queue::reconciler::ensure_evaluation_task;
use crate::utils::errors::DispatchError;
use crate::workers::evaluation_worker::EvaluationWorker;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 超时收回时记录的原因
pub const IN_FLIGHT_TIMEOUT_REASON: &str = "in-flight timeout";

/// 一次巡检的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 收回的处理任务数
    pub reclaimed_processing: usize,
    /// 收回的评估任务数
    pub reclaimed_evaluation: usize,
    /// 释放的失联工作器数
    pub released_workers: usize,
    /// 本轮分派的任务数
    pub dispatched: usize,
    /// 是否在后台触发了评估
    pub evaluation_triggered: bool,
}

/// 任务调度器
///
/// 周期巡检是回调丢失、进程重启等情况下的兜底：
/// 收回超时的执行中任务，释放绑定任务已结束的工作器，
/// 为所有空闲工作器分派任务，并触发评估。
pub struct TaskScheduler {
    tasks: Arc<dyn TaskRepository>,
    workers: Arc<dyn WorkerRepository>,
    dispatcher: Arc<Dispatcher>,
    evaluation: Arc<EvaluationWorker>,
    sweep_interval: TokioDuration,
    max_in_flight: Duration,
}

impl TaskScheduler {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `tasks` - 任务仓库
    /// * `workers` - 工作器仓库
    /// * `dispatcher` - 分派器
    /// * `evaluation` - 评估触发器
    /// * `sweep_interval` - 巡检间隔
    /// * `max_in_flight` - 任务允许停留在执行中状态的最长时间
    ///
    /// # 返回值
    ///
    /// 返回新的任务调度器实例
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        workers: Arc<dyn WorkerRepository>,
        dispatcher: Arc<Dispatcher>,
        evaluation: Arc<EvaluationWorker>,
        sweep_interval: TokioDuration,
        max_in_flight: Duration,
    ) -> Self {
        Self {
            tasks,
            workers,
            dispatcher,
            evaluation,
            sweep_interval,
            max_in_flight,
        }
    }

    /// 启动调度器后台任务
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = interval(scheduler.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let report = scheduler.sweep().await;
                debug!("Scheduler sweep finished: {:?}", report);
            }
        })
    }

    /// 执行一次巡检
    ///
    /// 任一步骤出错只记录日志，不影响后续步骤
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.reclaim_stuck(Pipeline::Processing).await {
            Ok(count) => report.reclaimed_processing = count,
            Err(e) => error!("Failed to reclaim stuck processing tasks: {}", e),
        }

        // 正在评估时的 EVALUATING 任务属于本进程，不能收回
        if self.evaluation.guard().is_held() {
            debug!("Evaluation running, skipping evaluation reclaim");
        } else {
            match self.reclaim_stuck(Pipeline::Evaluation).await {
                Ok(count) => report.reclaimed_evaluation = count,
                Err(e) => error!("Failed to reclaim stuck evaluation tasks: {}", e),
            }
        }

        match self.release_orphaned_workers().await {
            Ok(count) => report.released_workers = count,
            Err(e) => error!("Failed to release orphaned workers: {}", e),
        }

        match self.dispatcher.dispatch_all().await {
            Ok(count) => report.dispatched = count,
            Err(e) => error!("Sweep dispatch failed: {}", e),
        }

        self.evaluation.spawn_next();
        report.evaluation_triggered = true;

        if report.reclaimed_processing
            + report.reclaimed_evaluation
            + report.released_workers
            + report.dispatched
            > 0
        {
            info!(
                "Sweep reclaimed {}+{} tasks, released {} workers, dispatched {}",
                report.reclaimed_processing,
                report.reclaimed_evaluation,
                report.released_workers,
                report.dispatched
            );
        }
        report
    }

    /// 收回超时的执行中任务并释放其工作器
    async fn reclaim_stuck(&self, pipeline: Pipeline) -> Result<usize, DispatchError> {
        let threshold: DateTime<FixedOffset> = (Utc::now() - self.max_in_flight).into();
        let stuck = self.tasks.find_stuck(pipeline, threshold).await?;

        let mut reclaimed = 0;
        for task in stuck {
            let Ok(reverted) = task.clone().reclaim(IN_FLIGHT_TIMEOUT_REASON) else {
                continue;
            };
            if !self.tasks.compare_and_swap(&task, &reverted).await? {
                continue;
            }
            warn!(
                "Task {} exceeded the in-flight limit, returned to {}",
                task.id, reverted.status
            );
            reclaimed += 1;

            if pipeline == Pipeline::Processing {
                if let Some(worker_id) = task.worker_id {
                    self.workers.release(worker_id, task.id).await?;
                }
            }
        }

        if reclaimed > 0 {
            metrics::counter!("sweep_reclaimed_tasks_total", "pipeline" => pipeline.to_string())
                .increment(reclaimed as u64);
        }
        Ok(reclaimed)
    }

    /// 释放绑定任务已不在执行中的 BUSY 工作器
    ///
    /// 回调在任务状态写入后、释放工作器前失败时会留下这种工作器。
    /// 只处理超过执行时限未变动的工作器，分派中途的工作器不在此列。
    async fn release_orphaned_workers(&self) -> Result<usize, DispatchError> {
        let threshold: DateTime<FixedOffset> = (Utc::now() - self.max_in_flight).into();
        let mut released = 0;

        for worker in self.workers.list().await? {
            if worker.status != WorkerStatus::Busy || worker.updated_at > threshold {
                continue;
            }
            if self.release_if_orphaned(&worker).await? {
                warn!("Worker {} was left busy without a running task, released", worker.id);
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_if_orphaned(&self, worker: &Worker) -> Result<bool, DispatchError> {
        let Some(task_id) = worker.current_task_id else {
            self.workers
                .update_status(worker.id, WorkerStatus::Available)
                .await?;
            return Ok(true);
        };

        if let Some(task) = self.tasks.find_by_id(task_id).await? {
            if task.status.is_in_flight() && task.worker_id == Some(worker.id) {
                return Ok(false);
            }
            if task.status == TaskStatus::Processed && task.pipeline == Pipeline::Processing {
                ensure_evaluation_task(self.tasks.as_ref(), task.interview_id).await?;
            }
        }
        Ok(self.workers.release(worker.id, task_id).await?)
    }
}

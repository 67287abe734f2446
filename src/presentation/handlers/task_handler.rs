// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::task_response::{
    EvaluationTriggerResponseDto, WorkerListResponseDto,
};
use crate::domain::models::task::Task;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::presentation::errors::AppError;
use crate::queue::dispatcher::{Dispatcher, EnqueueOutcome};
use crate::workers::evaluation_worker::EvaluationWorker;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 为已提交的面试创建处理任务并尝试分派
///
/// # 返回值
///
/// 新建任务返回 201，任务已存在返回 200
pub async fn enqueue_interview(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    Path(interview_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnqueueOutcome>), AppError> {
    let outcome = dispatcher.enqueue(interview_id).await?;
    info!(
        "Interview {} enqueued as task {} ({})",
        interview_id,
        outcome.task.id,
        if outcome.dispatch.is_dispatched() {
            "dispatched"
        } else {
            "queued"
        }
    );

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// 查询单个任务
pub async fn get_task(
    Extension(tasks): Extension<Arc<dyn TaskRepository>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    let task = tasks
        .find_by_id(task_id)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(Json(task))
}

/// 列出所有工作器
pub async fn list_workers(
    Extension(workers): Extension<Arc<dyn WorkerRepository>>,
) -> Result<Json<WorkerListResponseDto>, AppError> {
    let workers = workers.list().await?;
    Ok(Json(workers.into()))
}

/// 在后台唤醒评估触发器
pub async fn run_evaluation(
    Extension(evaluation): Extension<Arc<EvaluationWorker>>,
) -> (StatusCode, Json<EvaluationTriggerResponseDto>) {
    let evaluation_running = evaluation.guard().is_held();
    evaluation.spawn_next();

    (
        StatusCode::ACCEPTED,
        Json(EvaluationTriggerResponseDto {
            accepted: true,
            evaluation_running,
        }),
    )
}

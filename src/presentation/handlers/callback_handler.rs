// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::callback_request::{
    FailedCallbackRequestDto, StatusCallbackRequestDto, WorkerIdleQuery,
};
use crate::domain::models::task::Pipeline;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::presentation::errors::AppError;
use crate::queue::reconciler::{ReconcileOutcome, StatusReconciler};
use crate::workers::evaluation_worker::EvaluationWorker;
use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

/// 工作器报告任务完成
///
/// 重复投递、任务不存在、状态不匹配都返回 200 和对应的结果
pub async fn task_processed(
    Extension(reconciler): Extension<Arc<StatusReconciler>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let outcome = reconciler.mark_processed(task_id).await?;
    Ok(Json(outcome))
}

/// 工作器报告任务失败
pub async fn task_failed(
    Extension(reconciler): Extension<Arc<StatusReconciler>>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<FailedCallbackRequestDto>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    request.validate()?;

    let outcome = reconciler.mark_failed(task_id, &request.reason).await?;
    Ok(Json(outcome))
}

/// 通用状态回调
pub async fn task_status(
    Extension(reconciler): Extension<Arc<StatusReconciler>>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<StatusCallbackRequestDto>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    request.validate()?;

    let outcome = reconciler.apply_status(task_id, request.into()).await?;
    Ok(Json(outcome))
}

/// 显式重试失败的任务
///
/// 评估任务重试后在后台唤醒评估触发器
pub async fn task_retry(
    Extension(reconciler): Extension<Arc<StatusReconciler>>,
    Extension(tasks): Extension<Arc<dyn TaskRepository>>,
    Extension(evaluation): Extension<Arc<EvaluationWorker>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let outcome = reconciler.retry(task_id).await?;

    if outcome == ReconcileOutcome::Applied {
        let pipeline = tasks.find_by_id(task_id).await?.map(|task| task.pipeline);
        if pipeline == Some(Pipeline::Evaluation) {
            debug!("Evaluation task {} retried, waking evaluation", task_id);
            evaluation.spawn_next();
        }
    }
    Ok(Json(outcome))
}

/// 工作器报告空闲，请求下一个任务
///
/// `after_task` 查询参数标识工作器刚结束的任务
pub async fn worker_idle(
    Extension(reconciler): Extension<Arc<StatusReconciler>>,
    Path(worker_id): Path<Uuid>,
    Query(query): Query<WorkerIdleQuery>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let outcome = reconciler.worker_idle(worker_id, query.after_task).await?;
    Ok(Json(outcome))
}

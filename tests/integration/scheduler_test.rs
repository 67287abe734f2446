// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{ago, TestContext};
use chrono::Duration;
use dispatchrs::domain::models::task::{Pipeline, Task, TaskStatus};
use dispatchrs::domain::models::worker::WorkerStatus;
use dispatchrs::infrastructure::database::entities::worker as worker_entity;
use dispatchrs::queue::scheduler::IN_FLIGHT_TIMEOUT_REASON;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// 把工作器的最后变动时间拨回到 `secs` 秒前
async fn age_worker(ctx: &TestContext, worker_id: Uuid, secs: i64) {
    worker_entity::Entity::update_many()
        .col_expr(worker_entity::Column::UpdatedAt, Expr::value(ago(secs)))
        .filter(worker_entity::Column::Id.eq(worker_id))
        .exec(ctx.db.as_ref())
        .await
        .unwrap();
}

/// 写入一个早已开始执行的任务
async fn stuck_task(
    ctx: &TestContext,
    interview_id: Uuid,
    pipeline: Pipeline,
    worker_id: Option<Uuid>,
    started_secs_ago: i64,
) -> Task {
    let mut task = Task::new(interview_id, pipeline)
        .start(worker_id)
        .unwrap();
    task.started_at = Some(ago(started_secs_ago));
    task.updated_at = ago(started_secs_ago);
    ctx.tasks.create(&task).await.unwrap()
}

#[tokio::test]
async fn test_sweep_reclaims_stuck_processing_task() {
    let ctx = TestContext::new().await;
    let worker = ctx.worker("silent", 100).await;
    let stuck = stuck_task(
        &ctx,
        ctx.interview().await,
        Pipeline::Processing,
        Some(worker.id),
        3600,
    )
    .await;
    assert!(ctx.workers.try_claim(worker.id, stuck.id).await.unwrap());

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.reclaimed_processing, 1);
    // 收回后同一轮巡检会重新分派
    assert_eq!(report.dispatched, 1);
    assert!(report.evaluation_triggered);

    let task = ctx.reload(stuck.id).await;
    assert_eq!(task.status, TaskStatus::Processing);
    assert_eq!(task.attempt_count, 2);
    // 重新开始执行时清除了超时原因
    assert_eq!(task.last_error, None);
    assert_eq!(ctx.invoker.call_count(), 1);
}

#[tokio::test]
async fn test_sweep_leaves_recent_in_flight_tasks_alone() {
    let ctx = TestContext::new().await;
    let worker = ctx.worker("busy", 100).await;
    let running = stuck_task(
        &ctx,
        ctx.interview().await,
        Pipeline::Processing,
        Some(worker.id),
        60,
    )
    .await;
    assert!(ctx.workers.try_claim(worker.id, running.id).await.unwrap());

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.reclaimed_processing, 0);
    assert_eq!(report.dispatched, 0);
    assert_eq!(ctx.reload(running.id).await.status, TaskStatus::Processing);
    assert_eq!(ctx.reload_worker(worker.id).await.status, WorkerStatus::Busy);
}

#[tokio::test]
async fn test_sweep_dispatches_tasks_queued_without_worker() {
    let ctx = TestContext::new().await;
    let first = ctx.task(ctx.interview().await, Pipeline::Processing, 30).await;
    let second = ctx.task(ctx.interview().await, Pipeline::Processing, 20).await;
    ctx.worker("worker-a", 10).await;
    ctx.worker("worker-b", 5).await;

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.dispatched, 2);
    assert_eq!(ctx.reload(first.id).await.status, TaskStatus::Processing);
    assert_eq!(ctx.reload(second.id).await.status, TaskStatus::Processing);
}

#[tokio::test]
async fn test_sweep_picks_up_failed_processing_below_cap() {
    let ctx = TestContext::new().await;
    ctx.worker("worker-a", 10).await;
    let mut failed = Task::new(ctx.interview().await, Pipeline::Processing);
    failed.status = TaskStatus::FailedProcessing;
    failed.attempt_count = 1;
    ctx.tasks.create(&failed).await.unwrap();

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(ctx.reload(failed.id).await.attempt_count, 2);
}

#[tokio::test]
async fn test_sweep_keeps_evaluating_task_while_guard_held() {
    let ctx = TestContext::new().await;
    let stuck = stuck_task(
        &ctx,
        ctx.evaluable_interview(1).await,
        Pipeline::Evaluation,
        None,
        3600,
    )
    .await;
    let scheduler = ctx.scheduler(Duration::minutes(30));

    let permit = ctx.evaluation.guard().try_acquire().unwrap();
    let report = scheduler.sweep().await;
    assert_eq!(report.reclaimed_evaluation, 0);
    assert_eq!(ctx.reload(stuck.id).await.status, TaskStatus::Evaluating);
    drop(permit);

    let report = scheduler.sweep().await;
    assert_eq!(report.reclaimed_evaluation, 1);
}

#[tokio::test]
async fn test_sweep_triggers_evaluation_of_processed_interview() {
    let ctx = TestContext::new().await;
    let interview_id = ctx.evaluable_interview(3).await;
    let task = ctx.task(interview_id, Pipeline::Evaluation, 10).await;

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;
    assert!(report.evaluation_triggered);

    let evaluated = ctx.wait_for_status(task.id, TaskStatus::Evaluated).await;
    assert_eq!(evaluated.attempt_count, 1);
    assert!(ctx.provider.evaluate_calls() >= 1);
}

#[tokio::test]
async fn test_sweep_reclaim_records_timeout_reason() {
    let ctx = TestContext::new().await;
    let stuck = stuck_task(
        &ctx,
        ctx.interview().await,
        Pipeline::Processing,
        None,
        3600,
    )
    .await;

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    // 没有工作器，任务停在入口状态
    assert_eq!(report.reclaimed_processing, 1);
    let task = ctx.reload(stuck.id).await;
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.last_error.as_deref(), Some(IN_FLIGHT_TIMEOUT_REASON));
}

#[tokio::test]
async fn test_sweep_releases_worker_stranded_after_processed() {
    let (ctx, flaky) = TestContext::flaky().await;
    let worker = ctx.worker("worker-a", 100).await;
    let outcome = ctx.dispatcher.enqueue(ctx.interview().await).await.unwrap();
    let finished = outcome.task.id;
    flaky.fail_next_evaluation_create();
    assert!(ctx.reconciler.mark_processed(finished).await.is_err());
    let queued = ctx.task(ctx.interview().await, Pipeline::Processing, 0).await;
    age_worker(&ctx, worker.id, 3600).await;

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.released_workers, 1);
    assert_eq!(report.dispatched, 1);
    let evaluation = ctx
        .tasks
        .find_by_interview(outcome.task.interview_id, Pipeline::Evaluation)
        .await
        .unwrap();
    assert!(evaluation.is_some());
    let worker = ctx.reload_worker(worker.id).await;
    assert_eq!(worker.status, WorkerStatus::Busy);
    assert_eq!(worker.current_task_id, Some(queued.id));
}

#[tokio::test]
async fn test_sweep_keeps_worker_running_long_task() {
    let ctx = TestContext::new().await;
    let worker = ctx.worker("worker-a", 100).await;
    let running = stuck_task(
        &ctx,
        ctx.interview().await,
        Pipeline::Processing,
        Some(worker.id),
        60,
    )
    .await;
    assert!(ctx.workers.try_claim(worker.id, running.id).await.unwrap());
    age_worker(&ctx, worker.id, 3600).await;

    let report = ctx.scheduler(Duration::minutes(30)).sweep().await;

    assert_eq!(report.released_workers, 0);
    let worker = ctx.reload_worker(worker.id).await;
    assert_eq!(worker.status, WorkerStatus::Busy);
    assert_eq!(worker.current_task_id, Some(running.id));
}

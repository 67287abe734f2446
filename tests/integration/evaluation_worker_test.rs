// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::TestContext;
use dispatchrs::domain::models::evaluation::CulturalFitEvaluation;
use dispatchrs::domain::models::task::{Pipeline, TaskStatus};
use dispatchrs::infrastructure::database::entities::{
    evaluation as evaluation_entity, interview as interview_entity,
};
use dispatchrs::infrastructure::repositories::interview_repo_impl::INTERVIEW_EVALUATED;
use dispatchrs::workers::evaluation_worker::EvaluationOutcome;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;

#[tokio::test]
async fn test_evaluation_saves_result_and_completes_task() {
    let ctx = TestContext::new().await;
    let interview_id = ctx.evaluable_interview(3).await;
    let task = ctx.task(interview_id, Pipeline::Evaluation, 10).await;

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(outcome, EvaluationOutcome::Evaluated { task_id: task.id });
    let done = ctx.reload(task.id).await;
    assert_eq!(done.status, TaskStatus::Evaluated);
    assert_eq!(done.attempt_count, 1);
    // 3 个回答按每批 2 个切分
    assert_eq!(ctx.provider.evaluate_calls(), 2);

    let interview = interview_entity::Entity::find_by_id(interview_id)
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.status, INTERVIEW_EVALUATED);
    assert!(interview.evaluated_at.is_some());

    let saved = evaluation_entity::Entity::find()
        .filter(evaluation_entity::Column::InterviewId.eq(interview_id))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let result: CulturalFitEvaluation = serde_json::from_value(saved.result).unwrap();
    let ids: Vec<&str> = result
        .per_question_results
        .iter()
        .map(|r| r.question_id.as_str())
        .collect();
    assert_eq!(ids, vec!["q1", "q2", "q3"]);
}

#[tokio::test]
async fn test_nothing_to_evaluate() {
    let ctx = TestContext::new().await;

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(outcome, EvaluationOutcome::NothingToDo);
    assert!(!ctx.evaluation.guard().is_held());
}

#[tokio::test]
async fn test_oldest_processed_interview_is_evaluated_first() {
    let ctx = TestContext::new().await;
    let newer = ctx
        .task(ctx.evaluable_interview(1).await, Pipeline::Evaluation, 10)
        .await;
    let older = ctx
        .task(ctx.evaluable_interview(1).await, Pipeline::Evaluation, 60)
        .await;

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(outcome, EvaluationOutcome::Evaluated { task_id: older.id });
    assert_eq!(ctx.reload(newer.id).await.status, TaskStatus::Processed);
}

#[tokio::test]
async fn test_concurrent_trigger_is_skipped_while_evaluating() {
    let ctx = TestContext::new().await;
    let task = ctx
        .task(ctx.evaluable_interview(1).await, Pipeline::Evaluation, 10)
        .await;
    ctx.provider.block();

    let worker = Arc::clone(&ctx.evaluation);
    let running = tokio::spawn(async move { worker.run_next_evaluation().await });
    ctx.provider.entered.notified().await;

    assert!(ctx.evaluation.guard().is_held());
    assert_eq!(ctx.reload(task.id).await.status, TaskStatus::Evaluating);
    assert_eq!(
        ctx.evaluation.run_next_evaluation().await.unwrap(),
        EvaluationOutcome::Skipped
    );

    ctx.provider.release();
    let outcome = running.await.unwrap().unwrap();

    assert_eq!(outcome, EvaluationOutcome::Evaluated { task_id: task.id });
    assert!(!ctx.evaluation.guard().is_held());
    assert_eq!(ctx.provider.evaluate_calls(), 1);
}

#[tokio::test]
async fn test_failed_chunk_is_skipped() {
    let ctx = TestContext::new().await;
    let task = ctx
        .task(ctx.evaluable_interview(3).await, Pipeline::Evaluation, 10)
        .await;
    ctx.provider
        .push_chunk_result(Err(anyhow::anyhow!("rate limited")));

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(outcome, EvaluationOutcome::Evaluated { task_id: task.id });
    let saved = evaluation_entity::Entity::find()
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let result: CulturalFitEvaluation = serde_json::from_value(saved.result).unwrap();
    assert_eq!(result.per_question_results.len(), 1);
    assert_eq!(result.per_question_results[0].question_id, "q3");
}

#[tokio::test]
async fn test_all_chunks_failing_fails_task_without_auto_retry() {
    let ctx = TestContext::new().await;
    let task = ctx
        .task(ctx.evaluable_interview(3).await, Pipeline::Evaluation, 10)
        .await;
    ctx.provider.push_chunk_result(Ok(None));
    ctx.provider.push_chunk_result(Ok(None));

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(
        outcome,
        EvaluationOutcome::Failed {
            task_id: task.id,
            reason: "all chunk evaluations failed".to_string()
        }
    );
    let failed = ctx.reload(task.id).await;
    assert_eq!(failed.status, TaskStatus::FailedEvaluation);
    assert_eq!(
        failed.last_error.as_deref(),
        Some("all chunk evaluations failed")
    );
    assert!(!ctx.evaluation.guard().is_held());

    assert_eq!(
        ctx.evaluation.run_next_evaluation().await.unwrap(),
        EvaluationOutcome::NothingToDo
    );
}

#[tokio::test]
async fn test_self_critique_failure_fails_task() {
    let ctx = TestContext::new().await;
    let interview_id = ctx.evaluable_interview(2).await;
    let task = ctx.task(interview_id, Pipeline::Evaluation, 10).await;
    ctx.provider.fail_critique();

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert!(matches!(
        outcome,
        EvaluationOutcome::Failed { task_id, ref reason }
            if task_id == task.id && reason == "self-critique failed"
    ));
    let saved = evaluation_entity::Entity::find()
        .filter(evaluation_entity::Column::InterviewId.eq(interview_id))
        .one(ctx.db.as_ref())
        .await
        .unwrap();
    assert!(saved.is_none());
}

#[tokio::test]
async fn test_missing_evaluation_input_fails_task() {
    let ctx = TestContext::new().await;
    let task = ctx
        .task(ctx.interview().await, Pipeline::Evaluation, 10)
        .await;

    let outcome = ctx.evaluation.run_next_evaluation().await.unwrap();

    assert_eq!(
        outcome,
        EvaluationOutcome::Failed {
            task_id: task.id,
            reason: "evaluation input missing".to_string()
        }
    );
    assert_eq!(ctx.provider.evaluate_calls(), 0);
}

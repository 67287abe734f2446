// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dispatchrs::domain::models::interview::QuestionTimestamp;
use dispatchrs::domain::models::worker::Worker;
use dispatchrs::domain::services::invoker::{
    CallbackUrls, InvocationError, WorkerInvoker, WorkerPayload,
};
use dispatchrs::infrastructure::services::http_invoker::HttpWorkerInvoker;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> WorkerPayload {
    let task_id = Uuid::new_v4();
    WorkerPayload {
        task_id,
        interview_id: Uuid::new_v4(),
        timestamps: vec![QuestionTimestamp {
            question_id: Some("q1".to_string()),
            question_text: Some("Why us?".to_string()),
            start: 0.0,
            end: 30.0,
            extra: serde_json::Map::new(),
        }],
        video_url: "https://media.test/interview.webm?expires=1&signature=abc".to_string(),
        questions: BTreeMap::from([("q1".to_string(), "Why us?".to_string())]),
        callback_urls: CallbackUrls {
            on_processed: format!("https://dispatch.test/v1/callbacks/tasks/{}/processed", task_id),
            on_status: format!("https://dispatch.test/v1/callbacks/tasks/{}/status", task_id),
            on_next_task: "https://dispatch.test/v1/callbacks/workers/w/idle".to_string(),
            on_retry: format!("https://dispatch.test/v1/callbacks/tasks/{}/retry", task_id),
        },
    }
}

#[tokio::test]
async fn test_invoke_posts_payload_to_worker() {
    let server = MockServer::start().await;
    let payload = payload();
    Mock::given(method("POST"))
        .and(path("/process-interview"))
        .and(header("X-Dispatch-Task-ID", payload.task_id.to_string().as_str()))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let invoker = HttpWorkerInvoker::new(Duration::from_secs(5));
    let worker = Worker::new("worker-a", format!("{}/", server.uri()));

    invoker.invoke(&worker, &payload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["task_id"], payload.task_id.to_string());
    assert_eq!(body["questions"]["q1"], "Why us?");
    assert_eq!(body["timestamps"][0]["questionId"], "q1");
    assert_eq!(
        body["callback_urls"]["on_processed"],
        payload.callback_urls.on_processed
    );
}

#[tokio::test]
async fn test_non_success_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process-interview"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let invoker = HttpWorkerInvoker::new(Duration::from_secs(5));
    let worker = Worker::new("worker-a", server.uri());

    let result = invoker.invoke(&worker, &payload()).await;

    assert!(matches!(result, Err(InvocationError::Rejected { status: 503 })));
}

#[tokio::test]
async fn test_slow_worker_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process-interview"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let invoker = HttpWorkerInvoker::new(Duration::from_millis(200));
    let worker = Worker::new("worker-a", server.uri());

    let result = invoker.invoke(&worker, &payload()).await;

    assert!(matches!(result, Err(InvocationError::Transport(_))));
}

#[tokio::test]
async fn test_unreachable_worker_is_a_transport_failure() {
    let invoker = HttpWorkerInvoker::new(Duration::from_secs(2));
    let worker = Worker::new("gone", "http://127.0.0.1:9");

    let result = invoker.invoke(&worker, &payload()).await;

    assert!(matches!(result, Err(InvocationError::Transport(_))));
}

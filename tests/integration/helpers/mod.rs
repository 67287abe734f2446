// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.


use chrono::{DateTime, Duration, FixedOffset, Utc};
use dispatchrs::domain::models::task::{Pipeline, Task, TaskStatus};
use dispatchrs::domain::models::worker::Worker;
use dispatchrs::domain::repositories::interview_repository::InterviewRepository;
use dispatchrs::domain::repositories::task_repository::TaskRepository;
use dispatchrs::domain::repositories::worker_repository::WorkerRepository;
use dispatchrs::domain::services::payload_builder::PayloadBuilder;
use dispatchrs::infrastructure::database::entities::interview as interview_entity;
use dispatchrs::infrastructure::repositories::interview_repo_impl::InterviewRepositoryImpl;
use dispatchrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use dispatchrs::infrastructure::repositories::worker_repo_impl::WorkerRepositoryImpl;
use dispatchrs::infrastructure::services::hmac_media_signer::HmacMediaSigner;
use dispatchrs::queue::dispatcher::Dispatcher;
use dispatchrs::queue::reconciler::StatusReconciler;
use dispatchrs::queue::scheduler::TaskScheduler;
use dispatchrs::workers::evaluation_guard::EvaluationGuard;
use dispatchrs::workers::evaluation_worker::EvaluationWorker;
use migration::{Migrator, MigratorTrait};
use mocks::{FlakyTaskRepository, RecordingInvoker, ScriptedProvider};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::json;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

pub const PUBLIC_BASE_URL: &str = "https://dispatch.test";

/// 基于内存 SQLite 的完整分派核心
#[allow(dead_code)]
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub tasks: Arc<dyn TaskRepository>,
    pub workers: Arc<dyn WorkerRepository>,
    pub interviews: Arc<dyn InterviewRepository>,
    pub invoker: Arc<RecordingInvoker>,
    pub provider: Arc<ScriptedProvider>,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<StatusReconciler>,
    pub evaluation: Arc<EvaluationWorker>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_max_attempts(3).await
    }

    pub async fn with_max_attempts(max_auto_attempts: i32) -> Self {
        Self::build(max_auto_attempts, |tasks| tasks).await
    }

    /// 任务仓库外包一层可注入故障的实现
    pub async fn flaky() -> (Self, Arc<FlakyTaskRepository>) {
        let mut flaky = None;
        let ctx = Self::build(3, |tasks| {
            let wrapped = Arc::new(FlakyTaskRepository::new(tasks));
            flaky = Some(wrapped.clone());
            wrapped as Arc<dyn TaskRepository>
        })
        .await;
        (ctx, flaky.unwrap())
    }

    async fn build(
        max_auto_attempts: i32,
        wrap: impl FnOnce(Arc<dyn TaskRepository>) -> Arc<dyn TaskRepository>,
    ) -> Self {
        let db = setup_db().await;
        let tasks = wrap(Arc::new(TaskRepositoryImpl::new(db.clone())));
        let workers: Arc<dyn WorkerRepository> = Arc::new(WorkerRepositoryImpl::new(db.clone()));
        let interviews: Arc<dyn InterviewRepository> =
            Arc::new(InterviewRepositoryImpl::new(db.clone()));
        let invoker = Arc::new(RecordingInvoker::default());
        let provider = Arc::new(ScriptedProvider::default());

        let payloads = Arc::new(PayloadBuilder::new(
            interviews.clone(),
            Arc::new(HmacMediaSigner::new("https://media.test", "test-secret").unwrap()),
            Url::parse(PUBLIC_BASE_URL).unwrap(),
            Duration::minutes(60),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            tasks.clone(),
            workers.clone(),
            interviews.clone(),
            invoker.clone(),
            payloads,
            max_auto_attempts,
        ));
        let reconciler = Arc::new(StatusReconciler::new(
            tasks.clone(),
            workers.clone(),
            dispatcher.clone(),
        ));
        let evaluation = Arc::new(EvaluationWorker::new(
            tasks.clone(),
            interviews.clone(),
            provider.clone(),
            EvaluationGuard::new(),
            2,
        ));

        Self {
            db,
            tasks,
            workers,
            interviews,
            invoker,
            provider,
            dispatcher,
            reconciler,
            evaluation,
        }
    }

    pub fn scheduler(&self, max_in_flight: Duration) -> TaskScheduler {
        TaskScheduler::new(
            self.tasks.clone(),
            self.workers.clone(),
            self.dispatcher.clone(),
            self.evaluation.clone(),
            std::time::Duration::from_secs(300),
            max_in_flight,
        )
    }

    /// 插入可分派的面试：带视频文件和两道题目
    pub async fn interview(&self) -> Uuid {
        insert_interview(
            &self.db,
            Some("interview.webm"),
            Some(json!([
                {"questionId": "q1", "questionText": "Why us?", "start": 0.0, "end": 30.0},
                {"questionId": "q2", "questionText": "A hard problem?", "start": 30.0, "end": 75.0}
            ])),
            None,
        )
        .await
    }

    /// 插入带评估输入的面试
    pub async fn evaluable_interview(&self, responses: usize) -> Uuid {
        let items: Vec<_> = (0..responses)
            .map(|i| {
                json!({
                    "questionId": format!("q{}", i + 1),
                    "questionText": format!("Question {}", i + 1),
                    "transcript": format!("Answer {}", i + 1),
                    "coreValues": ["Ownership"]
                })
            })
            .collect();
        insert_interview(
            &self.db,
            Some("interview.webm"),
            Some(json!([])),
            Some(json!({
                "responses": items,
                "companyProfile": {
                    "coreValues": {"Ownership": "We own outcomes"},
                    "mission": "Hire well"
                }
            })),
        )
        .await
    }

    /// 注册工作器，`age_secs` 越大注册得越早
    pub async fn worker(&self, name: &str, age_secs: i64) -> Worker {
        let mut worker = Worker::new(name, format!("http://{}.test", name));
        worker.registered_at = ago(age_secs);
        self.workers.create(&worker).await.unwrap()
    }

    /// 直接写入一个任务，`age_secs` 越大创建得越早
    pub async fn task(&self, interview_id: Uuid, pipeline: Pipeline, age_secs: i64) -> Task {
        let mut task = Task::new(interview_id, pipeline);
        task.created_at = ago(age_secs);
        task.updated_at = task.created_at;
        self.tasks.create(&task).await.unwrap()
    }

    pub async fn reload(&self, task_id: Uuid) -> Task {
        self.tasks.find_by_id(task_id).await.unwrap().unwrap()
    }

    pub async fn reload_worker(&self, worker_id: Uuid) -> Worker {
        self.workers.find_by_id(worker_id).await.unwrap().unwrap()
    }

    /// 等待任务进入指定状态
    pub async fn wait_for_status(&self, task_id: Uuid, status: TaskStatus) -> Task {
        for _ in 0..100 {
            let task = self.reload(task_id).await;
            if task.status == status {
                return task;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("task {} never reached {}", task_id, status);
    }
}

pub fn ago(secs: i64) -> DateTime<FixedOffset> {
    (Utc::now() - Duration::seconds(secs)).into()
}

pub async fn setup_db() -> Arc<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None).await.unwrap();
    db
}

pub async fn insert_interview(
    db: &DatabaseConnection,
    filename: Option<&str>,
    timestamps: Option<serde_json::Value>,
    context: Option<serde_json::Value>,
) -> Uuid {
    let id = Uuid::new_v4();
    interview_entity::ActiveModel {
        id: Set(id),
        filename: Set(filename.map(str::to_string)),
        timestamps: Set(timestamps),
        evaluation_context: Set(context),
        status: Set("SUBMITTED".to_string()),
        evaluated_at: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .unwrap();
    id
}

// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::Extension;
use dispatchrs::config::settings::Settings;
use dispatchrs::domain::repositories::interview_repository::InterviewRepository;
use dispatchrs::domain::repositories::task_repository::TaskRepository;
use dispatchrs::domain::repositories::worker_repository::WorkerRepository;
use dispatchrs::domain::services::evaluation_provider::EvaluationProvider;
use dispatchrs::domain::services::invoker::WorkerInvoker;
use dispatchrs::domain::services::media_signer::MediaUrlSigner;
use dispatchrs::domain::services::payload_builder::PayloadBuilder;
use dispatchrs::infrastructure::database::connection;
use dispatchrs::infrastructure::repositories::interview_repo_impl::InterviewRepositoryImpl;
use dispatchrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use dispatchrs::infrastructure::repositories::worker_repo_impl::WorkerRepositoryImpl;
use dispatchrs::infrastructure::services::hmac_media_signer::HmacMediaSigner;
use dispatchrs::infrastructure::services::http_invoker::HttpWorkerInvoker;
use dispatchrs::infrastructure::services::llm_evaluation_provider::LlmEvaluationProvider;
use dispatchrs::presentation::routes;
use dispatchrs::queue::dispatcher::Dispatcher;
use dispatchrs::queue::reconciler::StatusReconciler;
use dispatchrs::queue::scheduler::TaskScheduler;
use dispatchrs::workers::evaluation_guard::EvaluationGuard;
use dispatchrs::workers::evaluation_worker::EvaluationWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use dispatchrs::utils::telemetry;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting dispatchrs...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    dispatchrs::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Connect to database and run migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);

    // 4. Repositories
    let task_repo: Arc<dyn TaskRepository> = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let worker_repo: Arc<dyn WorkerRepository> = Arc::new(WorkerRepositoryImpl::new(db.clone()));
    let interview_repo: Arc<dyn InterviewRepository> =
        Arc::new(InterviewRepositoryImpl::new(db.clone()));

    // 5. Collaborators
    let signer: Arc<dyn MediaUrlSigner> = Arc::new(HmacMediaSigner::new(
        &settings.media.base_url,
        settings.media.signing_secret.clone(),
    )?);
    let invoker: Arc<dyn WorkerInvoker> = Arc::new(HttpWorkerInvoker::new(Duration::from_secs(
        settings.dispatch.invocation_timeout_secs,
    )));
    if settings.llm.api_key.is_none() {
        warn!("LLM api key not configured, evaluations will fail");
    }
    let provider: Arc<dyn EvaluationProvider> = Arc::new(LlmEvaluationProvider::new(&settings.llm));

    let payloads = Arc::new(PayloadBuilder::new(
        interview_repo.clone(),
        signer,
        Url::parse(&settings.dispatch.public_base_url)?,
        chrono::Duration::minutes(settings.dispatch.media_url_ttl_minutes),
    ));

    // 6. Dispatch core
    let dispatcher = Arc::new(Dispatcher::new(
        task_repo.clone(),
        worker_repo.clone(),
        interview_repo.clone(),
        invoker,
        payloads,
        settings.dispatch.max_auto_attempts,
    ));
    let reconciler = Arc::new(StatusReconciler::new(
        task_repo.clone(),
        worker_repo.clone(),
        dispatcher.clone(),
    ));
    let evaluation = Arc::new(EvaluationWorker::new(
        task_repo.clone(),
        interview_repo.clone(),
        provider,
        EvaluationGuard::new(),
        settings.evaluation.chunk_size,
    ));

    // 7. Periodic sweep
    if settings.scheduler.enabled {
        let scheduler = Arc::new(TaskScheduler::new(
            task_repo.clone(),
            worker_repo.clone(),
            dispatcher.clone(),
            evaluation.clone(),
            Duration::from_secs(settings.scheduler.sweep_interval_secs),
            chrono::Duration::seconds(settings.scheduler.max_in_flight_secs),
        ));
        scheduler.start();
        info!(
            "Scheduler started, sweeping every {}s",
            settings.scheduler.sweep_interval_secs
        );
    } else {
        warn!("Scheduler disabled, relying on callbacks only");
    }

    // 8. Start HTTP server
    let app = routes::routes()
        .layer(Extension(dispatcher))
        .layer(Extension(reconciler))
        .layer(Extension(evaluation))
        .layer(Extension(task_repo))
        .layer(Extension(worker_repo))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
